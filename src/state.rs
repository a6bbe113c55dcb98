use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use rapier3d::prelude::RigidBody;
use tracing::warn;

use crate::aven_drift::{DriftEvent, EngineStatus, WheelTransform, Wheels};
use crate::aven_drift::powertrain::Gear;
use crate::vehicle::Vehicle;

#[derive(Debug, Clone, Serialize)]
pub struct VehicleSnapshot {
    pub id: String,
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion (i, j, k, w)
    pub speed_kmh: f32,
    pub gear: Gear,
    pub drifting: bool,
    pub engine: EngineStatus,
    pub wheels: Wheels<WheelTransform>,
    pub wheel_spin: Wheels<f32>, // rad/s
    pub events: Vec<DriftEvent>,
}

impl VehicleSnapshot {
    pub fn capture(id: &str, vehicle: &Vehicle, body: &RigidBody) -> Self {
        let p = body.translation();
        let q = body.rotation();
        Self {
            id: id.to_string(),
            position: [p.x, p.y, p.z],
            rotation: [q.i, q.j, q.k, q.w],
            speed_kmh: vehicle.drift.speed_kmh(),
            gear: vehicle.drift.gear(),
            drifting: vehicle.drift.is_drifting(),
            engine: vehicle.status.engine,
            wheels: vehicle.status.wheels,
            wheel_spin: vehicle.drift.car_state().wheel_spin,
            events: vehicle.status.events.clone(),
        }
    }
}

/// Everything the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { player_id: String },
    Snapshot { tick: u64, vehicles: Vec<VehicleSnapshot> },
    Pong,
    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(err) => {
                warn!(%err, "failed to encode server message");
                None
            }
        }
    }
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: HashMap<String, UnboundedSender<String>>, // playerId → outgoing frames
}

impl Default for SharedGameState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedGameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, player_id: &str, tx: UnboundedSender<String>) {
        self.clients.insert(player_id.to_string(), tx);
    }

    pub fn remove_client(&mut self, player_id: &str) {
        self.clients.remove(player_id);
    }

    /// Build and send a snapshot of all vehicles to all clients.
    pub fn broadcast_snapshot(&mut self, vehicles: Vec<VehicleSnapshot>) {
        let Some(json) = (ServerMessage::Snapshot { tick: self.tick, vehicles }).to_json() else {
            return;
        };
        // a closed channel means the socket task is gone
        self.clients.retain(|_, tx| tx.send(json.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn messages_are_tagged_by_type() {
        let welcome = ServerMessage::Welcome { player_id: "p1".into() }.to_json();
        assert_eq!(welcome.as_deref(), Some(r#"{"type":"welcome","player_id":"p1"}"#));

        let pong = ServerMessage::Pong.to_json();
        assert_eq!(pong.as_deref(), Some(r#"{"type":"pong"}"#));
    }

    #[test]
    fn broadcast_reaches_clients_and_drops_closed_ones() {
        let mut state = SharedGameState::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        state.register_client("a", tx_a);
        state.register_client("b", tx_b);
        drop(rx_b);

        state.tick = 7;
        state.broadcast_snapshot(Vec::new());

        let frame = rx_a.try_recv().unwrap_or_default();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap_or_default();
        assert_eq!(v["type"], "snapshot");
        assert_eq!(v["tick"], 7);
        assert!(v["vehicles"].as_array().is_some_and(|a| a.is_empty()));
        assert_eq!(state.clients.len(), 1);
    }
}
