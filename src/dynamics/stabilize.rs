// ==============================================================================
// stabilize.rs — ATTITUDE CORRECTION + POSE RECOVERY
// ==============================================================================
// Level-triggered: the regime is re-derived from the chassis orientation on
// every call, nothing is latched. Evaluated strictly AFTER integration so it
// sees the attitude the player sees.
//
// Order per tick:
// 1) recovery  — tilt past max_tilt or resting on a side: snap the pose
//                upright (yaw preserved), lift, kill all velocity. Discrete;
//                a smoothed correction has no lever arm left to work with
//                on an inverted chassis.
// 2) roll      — two tiers: emergency gain past the threshold with a hard
//                angular velocity cut, gentle proportional torque otherwise.
// 3) pitch     — same two-tier shape, independent axis and constants.
//
// Torques are built in chassis space, rotated to world, and accumulated on
// the body; the world integrates and clears accumulators each step.
// ==============================================================================

use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::{Real, RigidBody, Vector, vector};

use crate::dynamics::telemetry::{DynamicsEvent, StabilityTier, TelemetrySink};
use crate::specs::StabilizationSpec;

/// Angles below this are treated as upright; no torque, no event.
const CORRECTION_DEADBAND: f32 = 1e-3; // radians

#[derive(Debug, Clone, Copy)]
pub struct AttitudeSample {
    pub local_forward: Vector<Real>,
    pub local_right: Vector<Real>,
    pub tilt: f32,  // radians from world up, unsigned
    pub roll: f32,  // radians, signed
    pub pitch: f32, // radians, signed
    pub is_sideways: bool,
}

impl AttitudeSample {
    pub fn from_rotation(rot: &UnitQuaternion<Real>, sideways_limit: f32) -> Self {
        let local_up = rot * vector![0.0, 1.0, 0.0];
        let local_forward = rot * vector![0.0, 0.0, 1.0];
        let local_right = rot * vector![1.0, 0.0, 0.0];

        let tilt = local_up.y.clamp(-1.0, 1.0).acos();
        let roll = local_right.y.atan2(local_up.y);
        let pitch = (-local_forward.y).atan2(local_up.y);
        let is_sideways = local_right.y.abs() > sideways_limit;

        Self {
            local_forward,
            local_right,
            tilt,
            roll,
            pitch,
            is_sideways,
        }
    }
}

/// Heading around world up, extracted so recovery can keep it. Falls back to
/// zero when the nose points straight up or down.
fn extract_yaw(local_forward: &Vector<Real>) -> f32 {
    let flat = vector![local_forward.x, 0.0, local_forward.z];
    if flat.norm() < 1e-6 {
        return 0.0;
    }
    flat.x.atan2(flat.z)
}

/// Scale the component of `angvel` along `axis` by `keep`, leaving the other
/// axes alone.
fn damp_axis(angvel: &mut Vector<Real>, axis: &Vector<Real>, keep: f32) {
    let along = angvel.dot(axis);
    *angvel += axis * (along * (keep - 1.0));
}

fn recover(body: &mut RigidBody, spec: &StabilizationSpec, sample: &AttitudeSample) {
    let yaw = extract_yaw(&sample.local_forward);
    let upright = UnitQuaternion::from_axis_angle(&Vector::y_axis(), yaw);
    let lifted = body.translation() + vector![0.0, spec.recovery_lift, 0.0];

    body.set_rotation(upright, true);
    body.set_translation(lifted, true);
    body.set_linvel(vector![0.0, 0.0, 0.0], true);
    body.set_angvel(vector![0.0, 0.0, 0.0], true);
}

pub fn stabilize(body: &mut RigidBody, spec: &StabilizationSpec, sink: &mut dyn TelemetrySink) {
    let rot = *body.rotation();
    let sample = AttitudeSample::from_rotation(&rot, spec.sideways_limit);

    // Past this point continuous correction cannot win; snap instead.
    if sample.tilt > spec.max_tilt || sample.is_sideways {
        recover(body, spec, &sample);
        sink.record(DynamicsEvent::Recovered { tilt: sample.tilt });
        return;
    }

    let mut angvel = *body.angvel();
    let mut torque = vector![0.0, 0.0, 0.0];

    // Roll: torque about the local forward axis.
    if sample.roll.abs() > CORRECTION_DEADBAND {
        let (gain, keep, tier) = if sample.roll.abs() > spec.emergency_roll_threshold {
            (spec.emergency_roll_strength, spec.emergency_damping, StabilityTier::Emergency)
        } else {
            (
                spec.roll_correction_strength,
                1.0 - spec.roll_correction_speed,
                StabilityTier::Normal,
            )
        };
        torque += rot * vector![0.0, 0.0, -sample.roll * gain];
        damp_axis(&mut angvel, &sample.local_forward, keep);
        sink.record(DynamicsEvent::RollCorrection { tier, angle: sample.roll });
    }

    // Pitch: torque about the local right axis, own constants.
    if sample.pitch.abs() > CORRECTION_DEADBAND {
        let (gain, keep, tier) = if sample.pitch.abs() > spec.emergency_pitch_threshold {
            (spec.emergency_pitch_strength, spec.emergency_damping, StabilityTier::Emergency)
        } else {
            (
                spec.pitch_correction_strength,
                1.0 - spec.pitch_correction_speed,
                StabilityTier::Normal,
            )
        };
        torque += rot * vector![-sample.pitch * gain, 0.0, 0.0];
        damp_axis(&mut angvel, &sample.local_right, keep);
        sink.record(DynamicsEvent::PitchCorrection { tier, angle: sample.pitch });
    }

    body.set_angvel(angvel, true);
    body.add_torque(torque, true);
}
