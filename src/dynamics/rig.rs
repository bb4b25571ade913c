// ==============================================================================
// rig.rs — FOUR-WHEEL RAYCAST SUSPENSION RIG
// ==============================================================================
// Thin ownership layer over rapier's DynamicRayCastVehicleController. The rig
// is the ONLY place that talks wheel units:
// - hardpoints are derived from chassis dimensions and the spec's axle
//   fractions, never hardcoded per model
// - engine force goes to all four wheels (full-time 4WD), brake to all four,
//   steering to the front pair only
// - the logical-force -> engine-API sign conversion lives in to_engine_units()
//   and nowhere else
//
// An airborne wheel still receives its forces; without ground contact the
// raycaster simply produces no reaction. Not an error.
// ==============================================================================

use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::prelude::{
    ColliderSet, QueryFilter, QueryPipeline, Real, RigidBodyHandle, RigidBodySet, point, vector,
};

use crate::specs::VehicleSpec;

pub const WHEEL_COUNT: usize = 4;

/// Wheel order: front-left, front-right, rear-left, rear-right.
const STEERABLE: [bool; WHEEL_COUNT] = [true, true, false, false];

/// The raycaster drives a wheel along its forward axis for positive engine
/// force, which matches the logical convention (+ = forward) as of the
/// current rapier wiring. Any future flip of either convention must happen
/// here and only here; the controllers upstream reason in logical terms.
#[inline]
fn to_engine_units(logical_force: f32) -> Real {
    logical_force
}

#[derive(Debug, Clone, Copy)]
pub struct WheelContact {
    pub in_contact: bool,
    pub suspension_length: f32,
}

pub struct WheelRig {
    controller: DynamicRayCastVehicleController,
}

impl WheelRig {
    pub fn new(chassis: RigidBodyHandle, spec: &VehicleSpec) -> Self {
        let mut controller = DynamicRayCastVehicleController::new(chassis);
        controller.index_up_axis = 1; // +Y
        controller.index_forward_axis = 2; // +Z

        let tuning = WheelTuning {
            suspension_stiffness: spec.wheel.suspension_stiffness,
            suspension_compression: spec.wheel.damping_compression,
            suspension_damping: spec.wheel.damping_relaxation,
            max_suspension_travel: spec.wheel.max_travel,
            side_friction_stiffness: 1.0,
            friction_slip: spec.wheel.friction_slip,
            max_suspension_force: spec.wheel.max_force,
        };

        let half_track = spec.chassis.width * spec.wheel.axle_track_fraction;
        let half_span = spec.chassis.length * spec.wheel.axle_span_fraction;
        // bullet folds roll_influence into the side-impulse moment arm; the
        // rapier port keeps that knob private, so shorten the arm at the
        // hardpoint instead
        let hard_y = -spec.wheel.roll_influence * spec.chassis.height;

        let hardpoints = [
            point![-half_track, hard_y, half_span],  // FL
            point![half_track, hard_y, half_span],   // FR
            point![-half_track, hard_y, -half_span], // RL
            point![half_track, hard_y, -half_span],  // RR
        ];

        for hardpoint in hardpoints {
            controller.add_wheel(
                hardpoint,
                vector![0.0, -1.0, 0.0], // suspension direction
                vector![1.0, 0.0, 0.0],  // axle
                spec.wheel.rest_length,
                spec.wheel.radius,
                &tuning,
            );
        }

        Self { controller }
    }

    pub fn chassis(&self) -> RigidBodyHandle {
        self.controller.chassis
    }

    /// Push one tick of resolved drive output down to the wheels.
    pub fn apply_drive(&mut self, engine_force: f32, brake_force: f32, steering: f32) {
        let engine = to_engine_units(engine_force);
        for (i, wheel) in self.controller.wheels_mut().iter_mut().enumerate() {
            wheel.engine_force = engine;
            wheel.brake = brake_force;
            wheel.steering = if STEERABLE[i] { steering } else { 0.0 };
        }
    }

    /// One fixed sub-step of suspension raycasts + wheel forces.
    pub fn update(
        &mut self,
        dt: Real,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
        queries: &QueryPipeline,
    ) {
        let filter = QueryFilter::default().exclude_rigid_body(self.controller.chassis);
        self.controller.update_vehicle(dt, bodies, colliders, queries, filter);
    }

    /// Scalar chassis speed, direction-agnostic. Consumers that care about
    /// direction compute forward_speed() themselves.
    pub fn speed(&self, bodies: &RigidBodySet) -> f32 {
        bodies
            .get(self.controller.chassis)
            .map(|body| body.linvel().norm())
            .unwrap_or(0.0)
    }

    pub fn contacts(&self) -> [WheelContact; WHEEL_COUNT] {
        let mut out = [WheelContact { in_contact: false, suspension_length: 0.0 }; WHEEL_COUNT];
        for (slot, wheel) in out.iter_mut().zip(self.controller.wheels()) {
            let info = wheel.raycast_info();
            slot.in_contact = info.is_in_contact;
            slot.suspension_length = info.suspension_length;
        }
        out
    }

    #[cfg(test)]
    pub(crate) fn wheels(&self) -> &[rapier3d::control::Wheel] {
        self.controller.wheels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::STOCK;
    use approx::assert_relative_eq;
    use rapier3d::prelude::RigidBodyBuilder;

    fn rig() -> (RigidBodySet, WheelRig) {
        let mut bodies = RigidBodySet::new();
        let chassis = bodies.insert(RigidBodyBuilder::dynamic().build());
        let rig = WheelRig::new(chassis, &STOCK);
        (bodies, rig)
    }

    #[test]
    fn four_wheel_drive_is_symmetric() {
        let (_bodies, mut rig) = rig();
        for force in [-350.0, 0.0, 700.0, 1500.0] {
            rig.apply_drive(force, 5.0, 0.3);
            for wheel in rig.wheels() {
                assert_relative_eq!(wheel.engine_force, to_engine_units(force));
                assert_relative_eq!(wheel.brake, 5.0);
            }
        }
    }

    #[test]
    fn only_the_front_pair_steers() {
        let (_bodies, mut rig) = rig();
        rig.apply_drive(700.0, 0.0, 0.65);
        let wheels = rig.wheels();
        assert_relative_eq!(wheels[0].steering, 0.65);
        assert_relative_eq!(wheels[1].steering, 0.65);
        assert_relative_eq!(wheels[2].steering, 0.0);
        assert_relative_eq!(wheels[3].steering, 0.0);
    }

    #[test]
    fn hardpoints_follow_the_spec_fractions_and_stay_symmetric() {
        let (_bodies, rig) = rig();
        let wheels = rig.wheels();
        let half_track = STOCK.chassis.width * STOCK.wheel.axle_track_fraction;
        let half_span = STOCK.chassis.length * STOCK.wheel.axle_span_fraction;

        assert_relative_eq!(wheels[0].chassis_connection_point_cs.x, -half_track);
        assert_relative_eq!(wheels[1].chassis_connection_point_cs.x, half_track);
        assert_relative_eq!(wheels[0].chassis_connection_point_cs.z, half_span);
        assert_relative_eq!(wheels[2].chassis_connection_point_cs.z, -half_span);
        // mirrored about the longitudinal axis
        assert_relative_eq!(
            wheels[0].chassis_connection_point_cs.x,
            -wheels[1].chassis_connection_point_cs.x
        );
        assert_relative_eq!(
            wheels[2].chassis_connection_point_cs.x,
            -wheels[3].chassis_connection_point_cs.x
        );
    }

    #[test]
    fn forward_drive_maps_to_positive_engine_units() {
        assert!(to_engine_units(700.0) > 0.0);
        assert!(to_engine_units(-350.0) < 0.0);
    }
}
