// ==============================================================================
// net.rs — WEBSOCKET INTAKE / BROADCAST
// ==============================================================================
// Browser clients connect here: logical drive intents and gimmick triggers
// come in as small JSON messages, per-tick snapshots go out on a broadcast
// channel. Input device mapping (keys -> intents) is the client's job.
// ==============================================================================

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::dynamics::drive::DriveIntent;
use crate::specs::VehicleSpec;
use crate::state::{SharedGameState, WelcomeMessage};

const BIND_ADDR: &str = "0.0.0.0:9001";
const DEFAULT_MODEL: &str = "stock";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    /// Per-tick intent; missing fields read as released keys.
    Input {
        #[serde(flatten)]
        intent: DriveIntent,
    },
    /// Switch the requested model (takes effect at the next spawn).
    Join { model: String },
    Reset,
    /// Boost pad: continuous world-space force for this frame.
    Boost { force: [f32; 3] },
    /// Jump pad: one world-space impulse.
    Jump { impulse: [f32; 3] },
    Ping,
}

pub async fn start_websocket_server(state: Arc<Mutex<SharedGameState>>) {
    let listener = TcpListener::bind(BIND_ADDR)
        .await
        .expect("failed to bind websocket port");

    println!("websocket listening on ws://{BIND_ADDR}");

    loop {
        let Ok((raw, _)) = listener.accept().await else {
            continue;
        };
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let ws = match accept_async(raw).await {
                Ok(ws) => ws,
                Err(_) => return,
            };
            let (mut write, mut read) = ws.split();

            let (tx, mut rx) = mpsc::unbounded_channel::<String>();

            let player_id = {
                let mut game = state.lock().await;
                game.register_client(tx.clone());
                game.add_player(DEFAULT_MODEL)
            };

            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    let _ = write.send(Message::Text(msg)).await;
                }
            });

            println!("player connected: {player_id}");
            send_welcome(&tx, &player_id, DEFAULT_MODEL);

            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(_) => break,
                };
                if !msg.is_text() {
                    continue;
                }
                let Ok(text) = msg.to_text() else {
                    continue;
                };
                let Ok(parsed) = serde_json::from_str::<ClientMessage>(text) else {
                    continue;
                };

                match parsed {
                    ClientMessage::Input { intent } => {
                        state.lock().await.set_intent(&player_id, intent);
                    }
                    ClientMessage::Join { model } => {
                        state.lock().await.set_model(&player_id, &model);
                        send_welcome(&tx, &player_id, &model);
                    }
                    ClientMessage::Reset => {
                        state.lock().await.request_reset(&player_id);
                    }
                    ClientMessage::Boost { force } => {
                        state.lock().await.queue_force(&player_id, force);
                    }
                    ClientMessage::Jump { impulse } => {
                        state.lock().await.queue_impulse(&player_id, impulse);
                    }
                    ClientMessage::Ping => {
                        let _ = tx.send(r#"{"type":"pong"}"#.into());
                    }
                }
            }

            println!("player disconnected: {player_id}");
            state.lock().await.mark_departed(&player_id);
        });
    }
}

fn send_welcome(tx: &mpsc::UnboundedSender<String>, player_id: &str, model: &str) {
    let welcome = WelcomeMessage {
        kind: "welcome",
        player_id,
        model,
        audio: VehicleSpec::preset(model).audio,
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = tx.send(json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_message_decodes_with_sparse_fields() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"input","accelerate":true,"turbo":true}"#).unwrap();
        match msg {
            ClientMessage::Input { intent } => {
                assert!(intent.accelerate);
                assert!(intent.turbo);
                assert!(!intent.brake);
                assert!(!intent.handbrake);
            }
            other => panic!("decoded {other:?}"),
        }
    }

    #[test]
    fn gimmick_messages_decode() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"boost","force":[0.0,0.0,900.0]}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Boost { force } if force[2] == 900.0));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"jump","impulse":[0.0,450.0,0.0]}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Jump { impulse } if impulse[1] == 450.0));
    }

    #[test]
    fn unknown_message_types_are_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"teleport"}"#).is_err());
    }
}
