//! drift-server
//!
//! Authoritative arcade drift server: the engine-agnostic `aven_drift`
//! controller driving rapier ray-cast vehicles, served over WebSocket.

pub mod aven_drift;
pub mod config;
pub mod net;
pub mod physics;
pub mod spawn;
pub mod state;
pub mod vehicle;
