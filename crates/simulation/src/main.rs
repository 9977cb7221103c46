//! Standalone room host with an in-memory replication gateway.

use simulation::{Config, LocalGateway, Room, RoomRuntime, SystemClock, TaskScheduler};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Simulation room v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Loaded configuration");
    info!("  Room: {}", config.simulation.room_id);
    info!(
        "  Tick: {}ms (resync every {} ticks)",
        config.simulation.tick_interval_ms, config.simulation.resync_interval_ticks
    );
    info!(
        "  Pools: {} characters, {} projectiles",
        config.pool.max_characters, config.pool.max_projectiles
    );

    let gateway = Arc::new(LocalGateway::new(
        config.simulation.room_id,
        config.replication.proximity_radius,
    ));
    let room = Arc::new(Room::new(config, Arc::new(SystemClock), gateway)?);
    let runtime = RoomRuntime::start(room, &TaskScheduler::current());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let stats = runtime.room().stats();
    info!(
        "Final occupancy: {}/{} characters, {}/{} projectiles",
        stats.characters.active,
        stats.characters.capacity,
        stats.projectiles.active,
        stats.projectiles.capacity
    );
    runtime.shutdown();

    Ok(())
}
