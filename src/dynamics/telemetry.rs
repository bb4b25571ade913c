// ==============================================================================
// telemetry.rs — STRUCTURED DYNAMICS EVENTS
// ------------------------------------------------------------------------------
// The controllers never log; they report through an injected sink. The server
// binary drains the per-vehicle log each tick and decides what to surface.
// ==============================================================================

use serde::Serialize;

use crate::dynamics::drive::DriveState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityTier {
    Normal,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DynamicsEvent {
    DriveShift { from: DriveState, to: DriveState },
    RollCorrection { tier: StabilityTier, angle: f32 },
    PitchCorrection { tier: StabilityTier, angle: f32 },
    Recovered { tilt: f32 },
}

pub trait TelemetrySink {
    fn record(&mut self, event: DynamicsEvent);
}

/// Per-vehicle event buffer, drained once per tick by the owner.
#[derive(Default)]
pub struct EventLog {
    events: Vec<DynamicsEvent>,
}

impl EventLog {
    pub fn take(&mut self) -> Vec<DynamicsEvent> {
        std::mem::take(&mut self.events)
    }

    #[cfg(test)]
    pub(crate) fn events(&self) -> &[DynamicsEvent] {
        &self.events
    }
}

impl TelemetrySink for EventLog {
    fn record(&mut self, event: DynamicsEvent) {
        self.events.push(event);
    }
}
