// ==============================================================================
// physics.rs — RAPIER WORLD PLUMBING
// ==============================================================================
// Owns the rigid-body sets and the pipeline, steps them at a fixed 1/60 s
// regardless of the frame dt handed in (accumulator with a bounded number of
// sub-steps), and clears force/torque accumulators after integration.
//
// Tick order inside step(): suspension raycasts + wheel forces first, then
// the pipeline. The stabilizer runs after step() returns, on the integrated
// orientation; that ordering belongs to the vehicle facade.
// ==============================================================================

use rapier3d::prelude::*;

use crate::dynamics::rig::WheelRig;
use crate::specs::VehicleSpec;

pub const FIXED_DT: f32 = 1.0 / 60.0;
pub const MAX_SUBSTEPS: u32 = 4;

const GRAVITY_Y: f32 = -20.0; // arcade gravity, not 9.81
const GROUND_HALF_EXTENT: f32 = 500.0;
const GROUND_FRICTION: f32 = 0.8;
const CHASSIS_FRICTION: f32 = 0.3;

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,
    accumulator: f32,
}

impl PhysicsWorld {
    /// Fresh world with a large static ground slab whose top surface sits at
    /// y = 0.
    pub fn new() -> Self {
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        let ground = bodies.insert(
            RigidBodyBuilder::fixed()
                .translation(vector![0.0, -1.0, 0.0])
                .build(),
        );
        colliders.insert_with_parent(
            ColliderBuilder::cuboid(GROUND_HALF_EXTENT, 1.0, GROUND_HALF_EXTENT)
                .friction(GROUND_FRICTION)
                .restitution(0.0)
                .build(),
            ground,
            &mut bodies,
        );

        Self {
            gravity: vector![0.0, GRAVITY_Y, 0.0],
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            accumulator: 0.0,
        }
    }

    /// Dynamic chassis body + box collider sized and weighted from the spec.
    pub fn spawn_chassis(&mut self, spec: &VehicleSpec, position: Vector<Real>) -> RigidBodyHandle {
        let volume = spec.chassis.width * spec.chassis.height * spec.chassis.length;
        let density = spec.chassis.mass / volume;

        let body = RigidBodyBuilder::dynamic()
            .translation(position)
            .linear_damping(spec.chassis.linear_damping)
            .angular_damping(spec.chassis.angular_damping)
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(
            spec.chassis.width * 0.5,
            spec.chassis.height * 0.5,
            spec.chassis.length * 0.5,
        )
        .density(density)
        .friction(CHASSIS_FRICTION)
        .restitution(0.0)
        .build();
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    pub fn despawn(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn body(&self, handle: RigidBodyHandle) -> &RigidBody {
        &self.bodies[handle]
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> &mut RigidBody {
        &mut self.bodies[handle]
    }

    /// Advance by `dt` of frame time in fixed sub-steps. Leftover time stays
    /// in the accumulator; excess beyond MAX_SUBSTEPS worth is dropped so a
    /// hitch cannot spiral.
    pub fn step(&mut self, dt: f32, rig: &mut WheelRig) {
        self.accumulator = (self.accumulator + dt).min(FIXED_DT * MAX_SUBSTEPS as f32);

        while self.accumulator >= FIXED_DT {
            self.accumulator -= FIXED_DT;

            self.query_pipeline.update(&self.colliders);
            rig.update(FIXED_DT, &mut self.bodies, &self.colliders, &self.query_pipeline);

            let hooks = ();
            let mut events = ();
            self.pipeline.step(
                &self.gravity,
                &IntegrationParameters {
                    dt: FIXED_DT,
                    ..IntegrationParameters::default()
                },
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                &mut self.ccd,
                Some(&mut self.query_pipeline),
                &mut events,
                &hooks,
            );
        }

        // accumulated forces/torques are consumed by integration; next frame
        // starts clean
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(true);
            body.reset_torques(true);
        }

        // failsafe against solver blow-ups: drag non-finite or runaway bodies
        // back to a sane pose instead of streaming NaN to clients
        for (_, body) in self.bodies.iter_mut() {
            let pos = *body.translation();
            let bad = !pos.x.is_finite()
                || !pos.y.is_finite()
                || !pos.z.is_finite()
                || pos.x.abs() > 1_000.0
                || pos.y.abs() > 1_000.0
                || pos.z.abs() > 1_000.0;
            if bad && body.is_dynamic() {
                body.set_translation(vector![0.0, 2.0, 0.0], true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);
                println!("reset runaway body to {:?}", body.translation());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::STOCK;

    #[test]
    fn substeps_accumulate_and_cap() {
        let mut world = PhysicsWorld::new();
        let chassis = world.spawn_chassis(&STOCK, vector![0.0, 5.0, 0.0]);
        let mut rig = WheelRig::new(chassis, &STOCK);

        // a huge frame dt is bounded: the body falls at most
        // MAX_SUBSTEPS * FIXED_DT worth of time
        let y0 = world.body(chassis).translation().y;
        world.step(10.0, &mut rig);
        let fallen = y0 - world.body(chassis).translation().y;
        let bound = 0.5 * GRAVITY_Y.abs() * (MAX_SUBSTEPS as f32 * FIXED_DT).powi(2);
        assert!(fallen <= bound * 1.5, "fell {fallen}, bound {bound}");
    }

    #[test]
    fn force_accumulators_are_cleared_after_step() {
        let mut world = PhysicsWorld::new();
        let chassis = world.spawn_chassis(&STOCK, vector![0.0, 5.0, 0.0]);
        let mut rig = WheelRig::new(chassis, &STOCK);

        world.body_mut(chassis).add_force(vector![100.0, 0.0, 0.0], true);
        world.body_mut(chassis).add_torque(vector![0.0, 50.0, 0.0], true);
        world.step(FIXED_DT, &mut rig);

        assert_eq!(world.body(chassis).user_force().norm(), 0.0);
        assert_eq!(world.body(chassis).user_torque().norm(), 0.0);
    }

    #[test]
    fn chassis_mass_matches_the_spec() {
        let mut world = PhysicsWorld::new();
        let chassis = world.spawn_chassis(&STOCK, vector![0.0, 1.0, 0.0]);
        let mass = world.body(chassis).mass();
        assert!((mass - STOCK.chassis.mass).abs() / STOCK.chassis.mass < 0.01);
    }
}
