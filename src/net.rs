use std::sync::Arc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::accept_async;
use tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aven_drift::{HeldActions, TuningError, TuningPatch};
use crate::physics::PhysicsWorld;
use crate::state::{ServerMessage, SharedGameState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GearCommand {
    Up,
    Down,
    Reverse,
    Neutral,
}

/// Client → server frames, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Input(HeldActions),
    Tune(TuningPatch),
    Upgrade { multiplier: f32 },
    Gear { command: GearCommand },
    Reset,
    Ping,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("rejected tuning: {0}")]
    Tuning(#[from] TuningError),
    #[error("upgrade multiplier must be finite and positive, got {0}")]
    Upgrade(f32),
    #[error("no vehicle for player {0}")]
    UnknownPlayer(String),
}

impl ClientMessage {
    pub fn from_json(txt: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(txt)?)
    }
}

/// Apply one client message to the player's vehicle. Returns a reply frame
/// for messages that want one.
pub fn handle_client_message(
    physics: &mut PhysicsWorld,
    player_id: &str,
    msg: ClientMessage,
) -> Result<Option<ServerMessage>, ProtocolError> {
    let unknown = || ProtocolError::UnknownPlayer(player_id.to_string());

    match msg {
        ClientMessage::Ping => return Ok(Some(ServerMessage::Pong)),
        ClientMessage::Input(held) => {
            if !physics.apply_player_input(player_id, held) {
                return Err(unknown());
            }
        }
        ClientMessage::Tune(patch) => {
            let vehicle = physics.vehicle_mut(player_id).ok_or_else(unknown)?;
            let tuning = vehicle.drift.tuning().patched(&patch)?;
            vehicle.drift.set_tuning(tuning);
            info!(player = player_id, "tuning updated");
        }
        ClientMessage::Upgrade { multiplier } => {
            if !(multiplier.is_finite() && multiplier > 0.0) {
                return Err(ProtocolError::Upgrade(multiplier));
            }
            let vehicle = physics.vehicle_mut(player_id).ok_or_else(unknown)?;
            vehicle.drift.apply_upgrade(multiplier);
            info!(player = player_id, multiplier, "engine upgrade");
        }
        ClientMessage::Gear { command } => {
            let vehicle = physics.vehicle_mut(player_id).ok_or_else(unknown)?;
            let change = match command {
                GearCommand::Up => vehicle.drift.shift_up(),
                GearCommand::Down => vehicle.drift.shift_down(),
                GearCommand::Reverse => vehicle.drift.set_reverse(),
                GearCommand::Neutral => vehicle.drift.set_neutral(),
            };
            debug!(player = player_id, ?command, ?change, "gear command");
        }
        ClientMessage::Reset => {
            if !physics.reset_vehicle(player_id) {
                return Err(unknown());
            }
        }
    }
    Ok(None)
}

pub async fn start_websocket_server(
    addr: String,
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket listening on ws://{addr}");

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };
        debug!(%peer, "tcp connection");
        tokio::spawn(handle_connection(raw, Arc::clone(&state), Arc::clone(&physics)));
    }
}

async fn handle_connection(
    raw: TcpStream,
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%err, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing channel + send loop
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // -------------------------------
    // 2) Vehicle + client registration (physics before state, as the tick loop)
    // -------------------------------
    let player_id = Uuid::new_v4().to_string();
    {
        let mut phys = physics.lock().await;
        let mut game = state.lock().await;
        phys.spawn_vehicle_for_player(&player_id);
        game.register_client(&player_id, tx.clone());
    }
    info!(player = %player_id, "player connected");

    send(&tx, ServerMessage::Welcome { player_id: player_id.clone() });

    // -------------------------------
    // 3) Main receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(err) => {
                debug!(player = %player_id, %err, "read error");
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else { continue };

        let result = match ClientMessage::from_json(text) {
            Ok(parsed) => {
                let mut phys = physics.lock().await;
                handle_client_message(&mut phys, &player_id, parsed)
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(Some(reply)) => send(&tx, reply),
            Ok(None) => {}
            Err(err) => {
                warn!(player = %player_id, %err, "rejected client message");
                send(&tx, ServerMessage::Error { message: err.to_string() });
            }
        }
    }

    info!(player = %player_id, "player disconnected");
    let mut phys = physics.lock().await;
    let mut game = state.lock().await;
    game.remove_client(&player_id);
    phys.remove_vehicle(&player_id);
}

fn send(tx: &mpsc::UnboundedSender<String>, msg: ServerMessage) {
    if let Some(json) = msg.to_json() {
        let _ = tx.send(json);
    }
}
