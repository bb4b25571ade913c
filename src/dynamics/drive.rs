// ==============================================================================
// drive.rs — INTENT RESOLVER (ENGINE / BRAKE / REVERSE / STEERING)
// ==============================================================================
// Turns one tick of player intent plus the current chassis motion into a
// DriveCommand. All force values here are LOGICAL: positive always means
// "drive forward". Whatever sign the wheel API wants is the rig's problem.
//
// Resolution order:
// 1) accelerate        -> Driving, full forward force (turbo-scaled)
// 2) else brake        -> Braking while moving forward, Reversing otherwise
//                         (deadband around zero keeps the two from chattering)
// 3) else              -> Idle, coast
//
// Output bounds, for every input:
//   engine_force ∈ [-base*reverse_multiplier, base*turbo_multiplier]
//   brake_force  ∈ [0, 2*brake_force]
//   steering     ∈ [-max_angle, max_angle]
// ==============================================================================

use rapier3d::prelude::{Real, Vector};
use serde::{Deserialize, Serialize};

use crate::specs::VehicleSpec;

/// Forward speeds inside this band count as "stopped" when the brake is held,
/// so braking hands over to reverse without oscillating at the zero crossing.
pub const FORWARD_DEADBAND: f32 = 0.05; // m/s

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveIntent {
    pub accelerate: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub turbo: bool,
    pub handbrake: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveState {
    Idle,
    Driving { turbo: bool },
    Braking,
    Reversing,
}

impl Default for DriveState {
    fn default() -> Self {
        DriveState::Idle
    }
}

/// One tick of resolved drive output, recomputed from scratch every tick.
/// Damping is part of the command so the reverse override can never desync
/// from the state that wanted it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    pub state: DriveState,
    pub engine_force: f32,    // N, logical (+ = forward)
    pub brake_force: f32,     // N, >= 0
    pub steering: f32,        // radians (+ = left)
    pub linear_damping: f32,  // chassis damping to apply this tick
    pub angular_damping: f32, // chassis damping to apply this tick
    pub assist_force: f32,    // N along the local backward axis (reverse only)
}

/// Signed projection of chassis velocity onto the facing direction.
/// Positive = moving the way the nose points.
#[inline]
pub fn forward_speed(velocity: &Vector<Real>, forward: &Vector<Real>) -> f32 {
    let fs = velocity.dot(forward);
    if fs.is_finite() { fs } else { 0.0 }
}

fn classify(intent: &DriveIntent, fwd_speed: f32) -> DriveState {
    if intent.accelerate {
        DriveState::Driving { turbo: intent.turbo }
    } else if intent.brake {
        if fwd_speed > FORWARD_DEADBAND {
            DriveState::Braking
        } else {
            DriveState::Reversing
        }
    } else {
        DriveState::Idle
    }
}

pub fn resolve(
    intent: &DriveIntent,
    velocity: &Vector<Real>,
    forward: &Vector<Real>,
    spec: &VehicleSpec,
) -> DriveCommand {
    let engine = &spec.engine;
    let speed = velocity.norm();
    let speed = if speed.is_finite() { speed } else { 0.0 };

    let state = classify(intent, forward_speed(velocity, forward));

    let mut engine_force = match state {
        DriveState::Driving { turbo: true } => engine.base_force * engine.turbo_multiplier,
        DriveState::Driving { turbo: false } => engine.base_force,
        DriveState::Reversing => -engine.base_force * engine.reverse_multiplier,
        DriveState::Braking | DriveState::Idle => 0.0,
    };

    let mut brake_force = match state {
        DriveState::Braking => engine.brake_force,
        _ => 0.0,
    };
    if intent.handbrake {
        brake_force = 2.0 * engine.brake_force;
    }

    // High-speed output fade. Forward drive only; reverse carries nothing
    // but its fixed multiplier.
    if engine_force > 0.0 && speed > engine.high_speed_threshold {
        let factor = (1.0 - (speed - engine.high_speed_threshold) / engine.reduction_speed_range)
            .max(engine.min_factor_at_high_speed);
        engine_force *= factor;
    }

    // Top speed cap, again forward drive only. Gravity and reverse are not
    // this rule's business.
    if engine_force > 0.0 && speed > engine.max_speed {
        engine_force = 0.0;
    }

    // Both steer keys held cancel to zero; there is no last-writer-wins.
    let mut steering = match (intent.steer_left, intent.steer_right) {
        (true, false) => spec.steering.max_angle,
        (false, true) => -spec.steering.max_angle,
        _ => 0.0,
    };
    if speed > spec.steering.high_speed_threshold {
        steering *= spec.steering.speed_factor;
    }

    // Reverse gets its drag override and direct-force assist; everything
    // else runs the chassis spec damping. Recomputed every tick.
    let (linear_damping, angular_damping, assist_force) = if state == DriveState::Reversing {
        (
            spec.reverse.damping_override,
            spec.reverse.damping_override,
            spec.reverse.assist_fraction * engine_force.abs(),
        )
    } else {
        (spec.chassis.linear_damping, spec.chassis.angular_damping, 0.0)
    };

    DriveCommand {
        state,
        engine_force: engine_force.clamp(
            -engine.base_force * engine.reverse_multiplier,
            engine.base_force * engine.turbo_multiplier,
        ),
        brake_force: brake_force.clamp(0.0, 2.0 * engine.brake_force),
        steering: steering.clamp(-spec.steering.max_angle, spec.steering.max_angle),
        linear_damping,
        angular_damping,
        assist_force,
    }
}
