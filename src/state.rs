// ==============================================================================
// state.rs — SHARED SESSION STATE + WIRE SNAPSHOTS
// ==============================================================================
// Net tasks only write intents and queued gimmick injections in here; the
// tick loop drains them. Vehicles and physics worlds live with the tick loop,
// not in shared state.
// ==============================================================================

use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::dynamics::drive::{DriveIntent, DriveState};
use crate::specs::AudioHints;
use crate::vehicle::AudioSignals;
use serde::Serialize;

pub struct PlayerSession {
    pub id: String,
    pub model: String,
    pub intent: DriveIntent,
    pub reset_requested: bool,
    pub pending_forces: Vec<[f32; 3]>,   // boost pads, this frame
    pub pending_impulses: Vec<[f32; 3]>, // jump pads, this frame
    pub departed: bool,
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: Vec<UnboundedSender<String>>,
    pub sessions: HashMap<String, PlayerSession>,
}

impl SharedGameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: Vec::new(),
            sessions: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) {
        self.clients.push(tx);
    }

    pub fn add_player(&mut self, model: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(
            id.clone(),
            PlayerSession {
                id: id.clone(),
                model: model.to_string(),
                intent: DriveIntent::default(),
                reset_requested: false,
                pending_forces: Vec::new(),
                pending_impulses: Vec::new(),
                departed: false,
            },
        );
        id
    }

    pub fn set_intent(&mut self, id: &str, intent: DriveIntent) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.intent = intent;
        }
    }

    pub fn set_model(&mut self, id: &str, model: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.model = model.to_string();
        }
    }

    pub fn request_reset(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.reset_requested = true;
        }
    }

    pub fn queue_force(&mut self, id: &str, force: [f32; 3]) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.pending_forces.push(force);
        }
    }

    pub fn queue_impulse(&mut self, id: &str, impulse: [f32; 3]) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.pending_impulses.push(impulse);
        }
    }

    /// Marks the session for teardown; the tick loop disposes the vehicle
    /// and drops the entry.
    pub fn mark_departed(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.departed = true;
        }
    }

    /// Send to every connected client, dropping channels that have closed.
    pub fn broadcast(&mut self, json: String) {
        self.clients.retain(|tx| tx.send(json.clone()).is_ok());
    }
}

// ------------------------------------------------------------------------------
// Wire formats (server -> client)
// ------------------------------------------------------------------------------

#[derive(Serialize)]
pub struct WelcomeMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str, // "welcome"
    pub player_id: &'a str,
    pub model: &'a str,
    pub audio: AudioHints,
}

#[derive(Serialize)]
pub struct WheelSnapshot {
    pub contact: bool,
    pub suspension_length: f32,
}

#[derive(Serialize)]
pub struct PlayerSnapshot {
    pub id: String,
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion xyzw
    pub speed: f32,
    pub forward_speed: f32, // signed; negative while reversing
    pub state: DriveState,
    pub wheels: Vec<WheelSnapshot>,
    pub audio: AudioSignals,
}

#[derive(Serialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: &'static str, // "snapshot"
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_round_trip_intents_and_queues() {
        let mut state = SharedGameState::new();
        let id = state.add_player("sport");

        let intent = DriveIntent { accelerate: true, ..Default::default() };
        state.set_intent(&id, intent);
        state.queue_force(&id, [0.0, 0.0, 100.0]);
        state.queue_impulse(&id, [0.0, 50.0, 0.0]);
        state.request_reset(&id);

        let session = &state.sessions[&id];
        assert_eq!(session.model, "sport");
        assert_eq!(session.intent, intent);
        assert_eq!(session.pending_forces.len(), 1);
        assert_eq!(session.pending_impulses.len(), 1);
        assert!(session.reset_requested);
        assert!(!session.departed);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut state = SharedGameState::new();
        state.set_intent("nobody", DriveIntent::default());
        state.request_reset("nobody");
        assert!(state.sessions.is_empty());
    }

    #[test]
    fn snapshot_serializes_with_type_tag() {
        let snapshot = Snapshot { kind: "snapshot", tick: 7, players: Vec::new() };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(r#""type":"snapshot""#));
        assert!(json.contains(r#""tick":7"#));
    }
}
