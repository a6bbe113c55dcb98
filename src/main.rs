use std::sync::Arc;

use anyhow::Context;
use drift_server::config::ServerConfig;
use drift_server::net::start_websocket_server;
use drift_server::physics::PhysicsWorld;
use drift_server::state::SharedGameState;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().context("reading server config")?;
    info!(addr = %config.bind_addr, tick_hz = config.tick_hz, "starting drift server");

    let state = Arc::new(Mutex::new(SharedGameState::new()));
    let physics = Arc::new(Mutex::new(PhysicsWorld::new(config.preset.clone())));

    tokio::select! {
        result = start_websocket_server(config.bind_addr.clone(), Arc::clone(&state), Arc::clone(&physics)) => {
            result.with_context(|| format!("websocket server on {}", config.bind_addr))?;
        }
        _ = run_simulation(&config, state, physics) => {}
    }
    Ok(())
}

/// Fixed timestep: drift pipeline + rapier step, then one snapshot per tick.
async fn run_simulation(
    config: &ServerConfig,
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
) {
    let dt = config.dt();
    let mut ticker = interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        // physics before state, same order as connection handling
        let mut phys = physics.lock().await;
        let mut game = state.lock().await;

        phys.step(dt);

        game.tick += 1;
        game.broadcast_snapshot(phys.vehicle_snapshots());
    }
}
