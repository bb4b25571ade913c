// ==============================================================================
// specs.rs — PER-MODEL VEHICLE TUNING TABLES
// ==============================================================================
// Static data consumed by the rig, the drive controller and the stabilizer.
// A spec is loaded (or picked from the preset tables) once at vehicle
// creation and never mutated afterwards.
//
// Every field has a default mirroring the stock arcade setup, so model files
// can be sparse JSON; a malformed spec is rejected by validate() at creation
// time, never at tick time.
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("{field}: must be finite and non-negative (got {value})")]
    Negative { field: &'static str, value: f32 },

    #[error("{field}: must be strictly positive (got {value})")]
    NotPositive { field: &'static str, value: f32 },

    #[error("{field}: must be within {min}..={max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

fn non_negative(field: &'static str, value: f32) -> Result<(), SpecError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SpecError::Negative { field, value })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), SpecError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SpecError::NotPositive { field, value })
    }
}

fn in_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), SpecError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(SpecError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

// ==============================================================================
// Sub-tables
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisSpec {
    pub mass: f32,            // kg
    pub width: f32,           // m (x)
    pub height: f32,          // m (y)
    pub length: f32,          // m (z)
    pub linear_damping: f32,  // drag while not reversing
    pub angular_damping: f32, // rotational drag while not reversing
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelSpec {
    pub radius: f32,               // m
    pub suspension_stiffness: f32, // spring constant
    pub damping_compression: f32,  // damper, bump
    pub damping_relaxation: f32,   // damper, rebound
    pub rest_length: f32,          // m
    pub max_travel: f32,           // m
    pub max_force: f32,            // N
    pub friction_slip: f32,        // tire grip handed to the raycaster
    pub roll_influence: f32,       // 0..1, lowers the hardpoint toward the roll center
    pub axle_track_fraction: f32,  // hardpoint x = width * fraction
    pub axle_span_fraction: f32,   // hardpoint z = length * fraction (front +, rear -)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSpec {
    pub base_force: f32,         // N, forward drive
    pub turbo_multiplier: f32,   // scale on base_force while turbo is held
    pub reverse_multiplier: f32, // scale on base_force while reversing
    pub brake_force: f32,        // per-wheel brake handed to the raycaster
    pub max_speed: f32,          // m/s, hard cap on forward drive

    // High-speed output fade: above the threshold, forward force decays
    // linearly over reduction_speed_range down to min_factor_at_high_speed.
    pub high_speed_threshold: f32,     // m/s
    pub min_factor_at_high_speed: f32, // 0..1
    pub reduction_speed_range: f32,    // m/s
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringSpec {
    pub max_angle: f32,            // radians at full lock
    pub high_speed_threshold: f32, // m/s
    pub speed_factor: f32,         // single multiplicative fade above the threshold
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationSpec {
    pub roll_correction_strength: f32,  // torque gain, normal tier
    pub roll_correction_speed: f32,     // angvel fraction removed per tick
    pub pitch_correction_strength: f32, // torque gain, normal tier
    pub pitch_correction_speed: f32,    // angvel fraction removed per tick

    pub emergency_roll_threshold: f32,  // radians
    pub emergency_roll_strength: f32,   // torque gain, emergency tier
    pub emergency_pitch_threshold: f32, // radians
    pub emergency_pitch_strength: f32,  // torque gain, emergency tier
    pub emergency_damping: f32,         // angvel multiplier per emergency tick

    pub max_tilt: f32,       // radians from world up; past this, recover
    pub sideways_limit: f32, // |localRight.y| above this counts as on-side
    pub recovery_lift: f32,  // m added on the up axis when recovering
}

// Reverse-gear compensation. The low reverse force would otherwise be eaten
// by chassis drag and wheel-force transfer losses in the suspension model;
// both knobs are gameplay-feel tuning, not physically derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseSpec {
    pub assist_fraction: f32,  // direct body force, fraction of reverse force
    pub damping_override: f32, // linear+angular damping while reversing
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    Rotary,
    VTwin,
    Inline4,
}

/// Per-model audio hints, forwarded verbatim to clients in the welcome
/// message. The server never synthesizes audio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioHints {
    pub engine_kind: EngineKind,
    pub base_frequency_hz: f32,
    pub turbo_whine: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSpec {
    pub chassis: ChassisSpec,
    pub wheel: WheelSpec,
    pub engine: EngineSpec,
    pub steering: SteeringSpec,
    pub stabilization: StabilizationSpec,
    pub reverse: ReverseSpec,
    pub audio: AudioHints,
}

// ==============================================================================
// Preset tables
// ==============================================================================

/// Stock arcade setup. Every Default impl below routes here.
pub const STOCK: VehicleSpec = VehicleSpec {
    chassis: ChassisSpec {
        mass: 170.0,  // kg
        width: 1.76,  // m
        height: 0.83, // m
        length: 4.29, // m
        linear_damping: 0.05,
        angular_damping: 0.5,
    },
    wheel: WheelSpec {
        radius: 0.33,
        suspension_stiffness: 80.0,
        damping_compression: 8.2,
        damping_relaxation: 13.0,
        rest_length: 0.3,
        max_travel: 0.3,
        max_force: 200_000.0,
        friction_slip: 50.0,
        roll_influence: 0.01,
        axle_track_fraction: 0.42,
        axle_span_fraction: 0.35,
    },
    engine: EngineSpec {
        base_force: 700.0,        // N
        turbo_multiplier: 2.143,  // 1500 N at full boost
        reverse_multiplier: 0.5,
        brake_force: 10.0,
        max_speed: 25.0,          // m/s (90 km/h)
        high_speed_threshold: 30.0,
        min_factor_at_high_speed: 0.2,
        reduction_speed_range: 50.0,
    },
    steering: SteeringSpec {
        max_angle: 0.65, // radians
        high_speed_threshold: 15.0,
        speed_factor: 0.8,
    },
    stabilization: StabilizationSpec {
        roll_correction_strength: 25.0,
        roll_correction_speed: 0.1,
        pitch_correction_strength: 10.0,
        pitch_correction_speed: 0.03,
        emergency_roll_threshold: 0.4, // ~23 degrees
        emergency_roll_strength: 120.0,
        emergency_pitch_threshold: 0.5,
        emergency_pitch_strength: 60.0,
        emergency_damping: 0.3,
        max_tilt: 0.6 * core::f32::consts::PI,
        sideways_limit: 0.7,
        recovery_lift: 1.0,
    },
    reverse: ReverseSpec {
        assist_fraction: 0.5,
        damping_override: 0.01,
    },
    audio: AudioHints {
        engine_kind: EngineKind::Inline4,
        base_frequency_hz: 80.0,
        turbo_whine: false,
    },
};

/// Rotary sports coupe: shorter, grippier, softer springs, boost whine.
pub const SPORT: VehicleSpec = VehicleSpec {
    chassis: ChassisSpec {
        mass: 180.0,
        width: 1.6,
        height: 0.5,
        length: 3.2,
        linear_damping: 0.05,
        angular_damping: 0.5,
    },
    wheel: WheelSpec {
        radius: 0.3,
        suspension_stiffness: 40.0,
        damping_compression: 4.4,
        damping_relaxation: 2.3,
        rest_length: 0.35,
        max_travel: 0.3,
        max_force: 100_000.0,
        friction_slip: 30.0,
        roll_influence: 0.05,
        axle_track_fraction: 0.42,
        axle_span_fraction: 0.35,
    },
    engine: EngineSpec {
        base_force: 500.0,
        turbo_multiplier: 3.0,
        reverse_multiplier: 0.5,
        brake_force: 10.0,
        max_speed: 20.0,
        high_speed_threshold: 30.0,
        min_factor_at_high_speed: 0.2,
        reduction_speed_range: 50.0,
    },
    steering: SteeringSpec {
        max_angle: 0.5,
        high_speed_threshold: 15.0,
        speed_factor: 0.7,
    },
    stabilization: StabilizationSpec {
        roll_correction_strength: 25.0,
        roll_correction_speed: 0.1,
        pitch_correction_strength: 10.0,
        pitch_correction_speed: 0.03,
        emergency_roll_threshold: 0.4,
        emergency_roll_strength: 120.0,
        emergency_pitch_threshold: 0.5,
        emergency_pitch_strength: 60.0,
        emergency_damping: 0.3,
        max_tilt: 0.6 * core::f32::consts::PI,
        sideways_limit: 0.7,
        recovery_lift: 1.0,
    },
    reverse: ReverseSpec {
        assist_fraction: 0.5,
        damping_override: 0.01,
    },
    audio: AudioHints {
        engine_kind: EngineKind::Rotary,
        base_frequency_hz: 90.0,
        turbo_whine: true,
    },
};

/// 1960s microcar: narrow track, lively steering, no boost hardware.
pub const KEI: VehicleSpec = VehicleSpec {
    chassis: ChassisSpec {
        mass: 180.0,
        width: 1.2,
        height: 0.4,
        length: 2.5,
        linear_damping: 0.05,
        angular_damping: 0.5,
    },
    wheel: WheelSpec {
        radius: 0.3,
        suspension_stiffness: 40.0,
        damping_compression: 4.4,
        damping_relaxation: 2.3,
        rest_length: 0.35,
        max_travel: 0.2,
        max_force: 100_000.0,
        friction_slip: 30.0,
        roll_influence: 0.05,
        axle_track_fraction: 0.42,
        axle_span_fraction: 0.35,
    },
    engine: EngineSpec {
        base_force: 500.0,
        turbo_multiplier: 1.0,
        reverse_multiplier: 0.5,
        brake_force: 10.0,
        max_speed: 20.0,
        high_speed_threshold: 30.0,
        min_factor_at_high_speed: 0.2,
        reduction_speed_range: 50.0,
    },
    steering: SteeringSpec {
        max_angle: 0.6,
        high_speed_threshold: 15.0,
        speed_factor: 0.9,
    },
    stabilization: StabilizationSpec {
        roll_correction_strength: 25.0,
        roll_correction_speed: 0.1,
        pitch_correction_strength: 10.0,
        pitch_correction_speed: 0.03,
        emergency_roll_threshold: 0.4,
        emergency_roll_strength: 120.0,
        emergency_pitch_threshold: 0.5,
        emergency_pitch_strength: 60.0,
        emergency_damping: 0.3,
        max_tilt: 0.6 * core::f32::consts::PI,
        sideways_limit: 0.7,
        recovery_lift: 1.0,
    },
    reverse: ReverseSpec {
        assist_fraction: 0.5,
        damping_override: 0.01,
    },
    audio: AudioHints {
        engine_kind: EngineKind::VTwin,
        base_frequency_hz: 60.0,
        turbo_whine: false,
    },
};

impl Default for ChassisSpec {
    fn default() -> Self {
        STOCK.chassis
    }
}
impl Default for WheelSpec {
    fn default() -> Self {
        STOCK.wheel
    }
}
impl Default for EngineSpec {
    fn default() -> Self {
        STOCK.engine
    }
}
impl Default for SteeringSpec {
    fn default() -> Self {
        STOCK.steering
    }
}
impl Default for StabilizationSpec {
    fn default() -> Self {
        STOCK.stabilization
    }
}
impl Default for ReverseSpec {
    fn default() -> Self {
        STOCK.reverse
    }
}
impl Default for AudioHints {
    fn default() -> Self {
        STOCK.audio
    }
}
impl Default for VehicleSpec {
    fn default() -> Self {
        STOCK
    }
}

impl VehicleSpec {
    /// Look up a preset by model id, falling back to the stock setup.
    pub fn preset(model: &str) -> VehicleSpec {
        match model {
            "sport" => SPORT,
            "kei" => KEI,
            _ => STOCK,
        }
    }

    /// Parse a sparse JSON model file; missing fields take stock values.
    pub fn from_json(text: &str) -> Result<VehicleSpec, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Reject a malformed spec before any body exists.
    pub fn validate(&self) -> Result<(), SpecError> {
        positive("chassis.mass", self.chassis.mass)?;
        positive("chassis.width", self.chassis.width)?;
        positive("chassis.height", self.chassis.height)?;
        positive("chassis.length", self.chassis.length)?;
        non_negative("chassis.linear_damping", self.chassis.linear_damping)?;
        non_negative("chassis.angular_damping", self.chassis.angular_damping)?;

        positive("wheel.radius", self.wheel.radius)?;
        positive("wheel.suspension_stiffness", self.wheel.suspension_stiffness)?;
        non_negative("wheel.damping_compression", self.wheel.damping_compression)?;
        non_negative("wheel.damping_relaxation", self.wheel.damping_relaxation)?;
        positive("wheel.rest_length", self.wheel.rest_length)?;
        positive("wheel.max_travel", self.wheel.max_travel)?;
        positive("wheel.max_force", self.wheel.max_force)?;
        non_negative("wheel.friction_slip", self.wheel.friction_slip)?;
        in_range("wheel.roll_influence", self.wheel.roll_influence, 0.0, 1.0)?;
        in_range("wheel.axle_track_fraction", self.wheel.axle_track_fraction, 0.01, 1.0)?;
        in_range("wheel.axle_span_fraction", self.wheel.axle_span_fraction, 0.01, 1.0)?;

        non_negative("engine.base_force", self.engine.base_force)?;
        non_negative("engine.turbo_multiplier", self.engine.turbo_multiplier)?;
        non_negative("engine.reverse_multiplier", self.engine.reverse_multiplier)?;
        non_negative("engine.brake_force", self.engine.brake_force)?;
        non_negative("engine.max_speed", self.engine.max_speed)?;
        non_negative("engine.high_speed_threshold", self.engine.high_speed_threshold)?;
        in_range(
            "engine.min_factor_at_high_speed",
            self.engine.min_factor_at_high_speed,
            0.0,
            1.0,
        )?;
        positive("engine.reduction_speed_range", self.engine.reduction_speed_range)?;

        non_negative("steering.max_angle", self.steering.max_angle)?;
        non_negative("steering.high_speed_threshold", self.steering.high_speed_threshold)?;
        in_range("steering.speed_factor", self.steering.speed_factor, 0.0, 1.0)?;

        let st = &self.stabilization;
        non_negative("stabilization.roll_correction_strength", st.roll_correction_strength)?;
        in_range("stabilization.roll_correction_speed", st.roll_correction_speed, 0.0, 1.0)?;
        non_negative("stabilization.pitch_correction_strength", st.pitch_correction_strength)?;
        in_range("stabilization.pitch_correction_speed", st.pitch_correction_speed, 0.0, 1.0)?;
        non_negative("stabilization.emergency_roll_threshold", st.emergency_roll_threshold)?;
        non_negative("stabilization.emergency_roll_strength", st.emergency_roll_strength)?;
        non_negative("stabilization.emergency_pitch_threshold", st.emergency_pitch_threshold)?;
        non_negative("stabilization.emergency_pitch_strength", st.emergency_pitch_strength)?;
        in_range("stabilization.emergency_damping", st.emergency_damping, 0.0, 1.0)?;
        positive("stabilization.max_tilt", st.max_tilt)?;
        in_range("stabilization.sideways_limit", st.sideways_limit, 0.0, 1.0)?;
        non_negative("stabilization.recovery_lift", st.recovery_lift)?;

        in_range("reverse.assist_fraction", self.reverse.assist_fraction, 0.0, 1.0)?;
        non_negative("reverse.damping_override", self.reverse.damping_override)?;

        positive("audio.base_frequency_hz", self.audio.base_frequency_hz)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        STOCK.validate().unwrap();
        SPORT.validate().unwrap();
        KEI.validate().unwrap();
    }

    #[test]
    fn sparse_json_takes_stock_defaults() {
        let spec = VehicleSpec::from_json(r#"{"engine": {"base_force": 900.0}}"#).unwrap();
        assert_eq!(spec.engine.base_force, 900.0);
        assert_eq!(spec.engine.max_speed, STOCK.engine.max_speed);
        assert_eq!(spec.chassis.mass, STOCK.chassis.mass);
        spec.validate().unwrap();
    }

    #[test]
    fn negative_mass_is_rejected() {
        let mut spec = STOCK;
        spec.chassis.mass = -1.0;
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("chassis.mass"));
    }

    #[test]
    fn nan_force_is_rejected() {
        let mut spec = STOCK;
        spec.engine.base_force = f32::NAN;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn out_of_range_factor_is_rejected() {
        let mut spec = STOCK;
        spec.engine.min_factor_at_high_speed = 1.5;
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("min_factor_at_high_speed"));
    }

    #[test]
    fn unknown_model_falls_back_to_stock() {
        let spec = VehicleSpec::preset("does-not-exist");
        assert_eq!(spec.chassis.mass, STOCK.chassis.mass);
    }
}
