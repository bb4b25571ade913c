// ==============================================================================
// vehicle.rs — VEHICLE FACADE
// ==============================================================================
// The one per-tick entry point the game loop talks to. Owns the chassis
// handle, the wheel rig and the per-vehicle event log; orchestrates the
// fixed tick order:
//
//   resolve drive -> wheels + damping + reverse assist -> integrate ->
//   stabilize (post-integration orientation)
//
// Gimmick entities (boost pads, jump pads) inject through apply_world_force /
// apply_world_impulse before update() runs in the same frame; their trigger
// and cooldown mechanics live outside this core.
// ==============================================================================

use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::{Real, RigidBodyHandle, Vector, vector};
use serde::Serialize;

use crate::dynamics::drive::{self, DriveIntent, DriveState};
use crate::dynamics::rig::{WHEEL_COUNT, WheelContact, WheelRig};
use crate::dynamics::stabilize;
use crate::dynamics::telemetry::{DynamicsEvent, EventLog, TelemetrySink};
use crate::physics::PhysicsWorld;
use crate::specs::{SpecError, VehicleSpec};

const DRIFT_YAW_RATE: f32 = 0.5; // rad/s
const DRIFT_MIN_SPEED: f32 = 5.0; // m/s

/// Read-only per-frame block for the audio client.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AudioSignals {
    pub speed: f32,
    pub accel_intent: i8, // +1 throttle, -1 brake/reverse, 0 coast
    pub turbo: bool,
    pub drifting: bool,
}

pub struct Vehicle {
    spec: VehicleSpec,
    rig: WheelRig,
    events: EventLog,
    state: DriveState,
    last_intent: DriveIntent,
}

impl Vehicle {
    /// Validates the spec first: a malformed spec is rejected before any
    /// body exists.
    pub fn create(
        world: &mut PhysicsWorld,
        spec: VehicleSpec,
        position: Vector<Real>,
    ) -> Result<Vehicle, SpecError> {
        spec.validate()?;
        let chassis = world.spawn_chassis(&spec, position);
        let rig = WheelRig::new(chassis, &spec);
        Ok(Vehicle {
            spec,
            rig,
            events: EventLog::default(),
            state: DriveState::Idle,
            last_intent: DriveIntent::default(),
        })
    }

    fn chassis(&self) -> RigidBodyHandle {
        self.rig.chassis()
    }

    /// One simulation tick. `dt` is frame time, already clamped upstream.
    pub fn update(&mut self, world: &mut PhysicsWorld, intent: &DriveIntent, dt: f32) {
        let (velocity, forward) = {
            let body = world.body(self.chassis());
            (*body.linvel(), body.rotation() * vector![0.0, 0.0, 1.0])
        };

        let cmd = drive::resolve(intent, &velocity, &forward, &self.spec);
        if cmd.state != self.state {
            self.events.record(DynamicsEvent::DriveShift { from: self.state, to: cmd.state });
            self.state = cmd.state;
        }

        self.rig.apply_drive(cmd.engine_force, cmd.brake_force, cmd.steering);
        {
            let body = world.body_mut(self.chassis());
            body.set_linear_damping(cmd.linear_damping);
            body.set_angular_damping(cmd.angular_damping);
            if cmd.assist_force > 0.0 {
                // wheel-force transfer losses eat most of the low reverse
                // force at crawl speeds; push the body directly as well
                let backward = *body.rotation() * vector![0.0, 0.0, -1.0];
                body.add_force(backward * cmd.assist_force, true);
            }
        }

        world.step(dt, &mut self.rig);

        stabilize::stabilize(
            world.body_mut(self.chassis()),
            &self.spec.stabilization,
            &mut self.events,
        );

        self.last_intent = *intent;
    }

    /// Teleport to `position` upright with zero velocity. Used for the
    /// player reset key and the fell-through-floor respawn.
    pub fn reset(&mut self, world: &mut PhysicsWorld, position: Vector<Real>) {
        self.rig.apply_drive(0.0, 0.0, 0.0);
        self.state = DriveState::Idle;
        self.last_intent = DriveIntent::default();

        let body = world.body_mut(self.chassis());
        body.set_translation(position, true);
        body.set_rotation(UnitQuaternion::identity(), true);
        body.set_linvel(vector![0.0, 0.0, 0.0], true);
        body.set_angvel(vector![0.0, 0.0, 0.0], true);
        body.reset_forces(true);
        body.reset_torques(true);
    }

    pub fn dispose(self, world: &mut PhysicsWorld) {
        world.despawn(self.chassis());
    }

    pub fn speed(&self, world: &PhysicsWorld) -> f32 {
        self.rig.speed(&world.bodies)
    }

    pub fn position(&self, world: &PhysicsWorld) -> Vector<Real> {
        *world.body(self.chassis()).translation()
    }

    pub fn rotation(&self, world: &PhysicsWorld) -> UnitQuaternion<Real> {
        *world.body(self.chassis()).rotation()
    }

    pub fn forward_speed(&self, world: &PhysicsWorld) -> f32 {
        let body = world.body(self.chassis());
        let forward = body.rotation() * vector![0.0, 0.0, 1.0];
        drive::forward_speed(body.linvel(), &forward)
    }

    pub fn wheel_contacts(&self) -> [WheelContact; WHEEL_COUNT] {
        self.rig.contacts()
    }

    /// Continuous world-space force at the chassis center, active for the
    /// current frame's integration. Boost pads use this.
    pub fn apply_world_force(&self, world: &mut PhysicsWorld, force: Vector<Real>) {
        world.body_mut(self.chassis()).add_force(force, true);
    }

    /// Instantaneous world-space impulse at the chassis center. Jump pads
    /// use this.
    pub fn apply_world_impulse(&self, world: &mut PhysicsWorld, impulse: Vector<Real>) {
        world.body_mut(self.chassis()).apply_impulse(impulse, true);
    }

    pub fn audio_signals(&self, world: &PhysicsWorld) -> AudioSignals {
        let body = world.body(self.chassis());
        let speed = body.linvel().norm();
        let accel_intent = if self.last_intent.accelerate {
            1
        } else if self.last_intent.brake {
            -1
        } else {
            0
        };
        AudioSignals {
            speed,
            accel_intent,
            turbo: self.last_intent.accelerate && self.last_intent.turbo,
            drifting: body.angvel().y.abs() > DRIFT_YAW_RATE && speed > DRIFT_MIN_SPEED,
        }
    }

    pub fn drive_state(&self) -> DriveState {
        self.state
    }

    /// Drain this tick's structured events.
    pub fn take_events(&mut self) -> Vec<DynamicsEvent> {
        self.events.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::FIXED_DT;
    use crate::specs::STOCK;
    use approx::assert_relative_eq;

    fn spawned() -> (PhysicsWorld, Vehicle) {
        let mut world = PhysicsWorld::new();
        let vehicle = Vehicle::create(&mut world, STOCK, vector![0.0, 1.0, 0.0]).unwrap();
        (world, vehicle)
    }

    fn settle(world: &mut PhysicsWorld, vehicle: &mut Vehicle, ticks: usize) {
        let idle = DriveIntent::default();
        for _ in 0..ticks {
            vehicle.update(world, &idle, FIXED_DT);
        }
    }

    #[test]
    fn malformed_spec_fails_at_creation() {
        let mut world = PhysicsWorld::new();
        let mut spec = STOCK;
        spec.chassis.mass = 0.0;
        assert!(Vehicle::create(&mut world, spec, vector![0.0, 1.0, 0.0]).is_err());
    }

    #[test]
    fn vehicle_settles_onto_its_wheels() {
        let (mut world, mut vehicle) = spawned();
        settle(&mut world, &mut vehicle, 180);
        let contacts = vehicle.wheel_contacts();
        assert!(contacts.iter().all(|c| c.in_contact), "contacts: {contacts:?}");
        assert!(vehicle.speed(&world) < 0.5);
    }

    #[test]
    fn sustained_turbo_approaches_but_never_exceeds_top_speed() {
        let mut spec = STOCK;
        spec.engine.base_force = 500.0;
        spec.engine.turbo_multiplier = 3.0;
        spec.engine.max_speed = 20.0;

        let mut world = PhysicsWorld::new();
        let mut vehicle = Vehicle::create(&mut world, spec, vector![0.0, 1.0, 0.0]).unwrap();
        settle(&mut world, &mut vehicle, 180);

        let intent = DriveIntent { accelerate: true, turbo: true, ..Default::default() };
        let mut top = 0.0f32;
        for _ in 0..300 {
            vehicle.update(&mut world, &intent, FIXED_DT);
            top = top.max(vehicle.speed(&world));
        }
        // 5 s of full boost from rest: pinned at the cap, overshooting by at
        // most one tick of acceleration
        assert!(top <= spec.engine.max_speed + 0.8, "top speed {top}");
        assert!(vehicle.speed(&world) > 12.0, "only reached {}", vehicle.speed(&world));
    }

    #[test]
    fn holding_brake_at_rest_backs_the_vehicle_up() {
        let (mut world, mut vehicle) = spawned();
        settle(&mut world, &mut vehicle, 180);

        let intent = DriveIntent { brake: true, ..Default::default() };
        for _ in 0..120 {
            vehicle.update(&mut world, &intent, FIXED_DT);
        }
        assert_eq!(vehicle.drive_state(), DriveState::Reversing);
        assert!(vehicle.forward_speed(&world) < -0.3, "fwd {}", vehicle.forward_speed(&world));
    }

    #[test]
    fn reset_is_idempotent() {
        let (mut world, mut vehicle) = spawned();
        let intent = DriveIntent { accelerate: true, ..Default::default() };
        for _ in 0..60 {
            vehicle.update(&mut world, &intent, FIXED_DT);
        }

        let target = vector![5.0, 2.0, -3.0];
        vehicle.reset(&mut world, target);
        let once = (
            vehicle.position(&world),
            vehicle.rotation(&world),
            *world.body(vehicle.chassis()).linvel(),
            *world.body(vehicle.chassis()).angvel(),
        );
        vehicle.reset(&mut world, target);
        let twice = (
            vehicle.position(&world),
            vehicle.rotation(&world),
            *world.body(vehicle.chassis()).linvel(),
            *world.body(vehicle.chassis()).angvel(),
        );

        assert_eq!(once, twice);
        assert_relative_eq!(once.0.x, 5.0);
        assert_relative_eq!(once.0.y, 2.0);
        assert_relative_eq!(once.0.z, -3.0);
        assert_eq!(once.2.norm(), 0.0);
        assert_eq!(once.3.norm(), 0.0);
    }

    #[test]
    fn world_force_injection_moves_the_chassis() {
        let (mut world, mut vehicle) = spawned();
        settle(&mut world, &mut vehicle, 180);

        // boost-pad style push along the rolling direction, queued before
        // the tick
        vehicle.apply_world_force(&mut world, vector![0.0, 0.0, 4_000.0]);
        vehicle.update(&mut world, &DriveIntent::default(), FIXED_DT);
        let vel = *world.body(vehicle.chassis()).linvel();
        assert!(vel.z > 0.1, "vz {}", vel.z);
    }

    #[test]
    fn world_impulse_injection_is_immediate() {
        let (mut world, mut vehicle) = spawned();
        settle(&mut world, &mut vehicle, 180);

        let before = world.body(vehicle.chassis()).linvel().y;
        vehicle.apply_world_impulse(&mut world, vector![0.0, 600.0, 0.0]);
        let after = world.body(vehicle.chassis()).linvel().y;
        assert!(after > before + 1.0, "before {before}, after {after}");
    }

    #[test]
    fn audio_block_tracks_intent_and_motion() {
        let (mut world, mut vehicle) = spawned();
        settle(&mut world, &mut vehicle, 180);

        let intent = DriveIntent { accelerate: true, turbo: true, ..Default::default() };
        for _ in 0..60 {
            vehicle.update(&mut world, &intent, FIXED_DT);
        }
        let audio = vehicle.audio_signals(&world);
        assert_eq!(audio.accel_intent, 1);
        assert!(audio.turbo);
        assert!(audio.speed > 1.0);

        vehicle.update(&mut world, &DriveIntent { brake: true, ..Default::default() }, FIXED_DT);
        assert_eq!(vehicle.audio_signals(&world).accel_intent, -1);
    }

    #[test]
    fn dispose_removes_the_chassis() {
        let (mut world, vehicle) = spawned();
        let count = world.bodies.len();
        vehicle.dispose(&mut world);
        assert_eq!(world.bodies.len(), count - 1);
    }
}
