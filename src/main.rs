mod dynamics;
mod net;
mod physics;
mod specs;
mod state;
mod vehicle;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use rapier3d::prelude::{Real, Vector, vector};
use tokio::sync::Mutex;
use tokio::time::{Duration, interval};

use crate::dynamics::telemetry::DynamicsEvent;
use crate::physics::PhysicsWorld;
use crate::specs::VehicleSpec;
use crate::state::{PlayerSnapshot, SharedGameState, Snapshot, WheelSnapshot};
use crate::vehicle::Vehicle;

const TICK: Duration = Duration::from_millis(16);
const MAX_FRAME_DT: f32 = 0.1; // hitches are bounded here, before the core
const KILL_PLANE_Y: f32 = -40.0; // fell through the floor: respawn

fn spawn_position() -> Vector<Real> {
    let mut rng = rand::thread_rng();
    vector![rng.gen_range(-4.0..4.0), 2.0, 10.0 + rng.gen_range(-4.0..4.0)]
}

/// A `models/<id>.json` file overrides the built-in preset; sparse files
/// inherit stock values field by field.
fn model_spec(model: &str) -> VehicleSpec {
    let path = format!("models/{model}.json");
    match std::fs::read_to_string(&path) {
        Ok(text) => match VehicleSpec::from_json(&text) {
            Ok(spec) => {
                println!("loaded model spec from {path}");
                spec
            }
            Err(err) => {
                println!("ignoring malformed {path}: {err}");
                VehicleSpec::preset(model)
            }
        },
        Err(_) => VehicleSpec::preset(model),
    }
}

#[tokio::main]
async fn main() {
    println!("starting drive server...");

    let state = Arc::new(Mutex::new(SharedGameState::new()));
    tokio::spawn(net::start_websocket_server(Arc::clone(&state)));

    // One world per session: every player drives their own course instance.
    let mut worlds: HashMap<String, (PhysicsWorld, Vehicle)> = HashMap::new();

    let mut ticker = interval(TICK);
    let mut last = Instant::now();

    loop {
        ticker.tick().await;
        let dt = last.elapsed().as_secs_f32().min(MAX_FRAME_DT);
        last = Instant::now();

        let mut game = state.lock().await;

        // tear down sessions whose socket closed
        let departed: Vec<String> = game
            .sessions
            .values()
            .filter(|s| s.departed)
            .map(|s| s.id.clone())
            .collect();
        for id in departed {
            if let Some((mut world, vehicle)) = worlds.remove(&id) {
                vehicle.dispose(&mut world);
            }
            game.sessions.remove(&id);
            println!("session closed: {id}");
        }

        // spawn vehicles for new sessions
        let missing: Vec<(String, String)> = game
            .sessions
            .values()
            .filter(|s| !worlds.contains_key(&s.id))
            .map(|s| (s.id.clone(), s.model.clone()))
            .collect();
        for (id, model) in missing {
            let spec = model_spec(&model);
            let mut world = PhysicsWorld::new();
            match Vehicle::create(&mut world, spec, spawn_position()) {
                Ok(vehicle) => {
                    println!("spawned {model} for {id}");
                    worlds.insert(id, (world, vehicle));
                }
                Err(err) => {
                    println!("spawn rejected for {id}: {err}");
                    game.sessions.remove(&id);
                }
            }
        }

        // tick every session; queued gimmick injections land before the
        // dynamics update in the same frame
        let mut players = Vec::with_capacity(worlds.len());
        for session in game.sessions.values_mut() {
            let Some((world, vehicle)) = worlds.get_mut(&session.id) else {
                continue;
            };

            for f in session.pending_forces.drain(..) {
                vehicle.apply_world_force(world, vector![f[0], f[1], f[2]]);
            }
            for j in session.pending_impulses.drain(..) {
                vehicle.apply_world_impulse(world, vector![j[0], j[1], j[2]]);
            }
            if session.reset_requested || vehicle.position(world).y < KILL_PLANE_Y {
                vehicle.reset(world, spawn_position());
                session.reset_requested = false;
            }

            vehicle.update(world, &session.intent, dt);

            for event in vehicle.take_events() {
                if let DynamicsEvent::Recovered { tilt } = event {
                    println!("recovered {} from tilt {:.2} rad", session.id, tilt);
                }
            }

            let position = vehicle.position(world);
            let rotation = vehicle.rotation(world);
            players.push(PlayerSnapshot {
                id: session.id.clone(),
                position: [position.x, position.y, position.z],
                rotation: [rotation.i, rotation.j, rotation.k, rotation.w],
                speed: vehicle.speed(world),
                forward_speed: vehicle.forward_speed(world),
                state: vehicle.drive_state(),
                wheels: vehicle
                    .wheel_contacts()
                    .iter()
                    .map(|c| WheelSnapshot {
                        contact: c.in_contact,
                        suspension_length: c.suspension_length,
                    })
                    .collect(),
                audio: vehicle.audio_signals(world),
            });
        }

        game.tick += 1;
        let snapshot = Snapshot { kind: "snapshot", tick: game.tick, players };
        match serde_json::to_string(&snapshot) {
            Ok(json) => game.broadcast(json),
            Err(err) => println!("snapshot encode failed: {err}"),
        }
    }
}
