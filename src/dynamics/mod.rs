//! dynamics - drive + stability controllers (pure types + solvers)

pub mod drive;
pub mod rig;
pub mod stabilize;
pub mod telemetry;
