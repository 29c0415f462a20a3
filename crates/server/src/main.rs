use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use blockforge_engine::manager::WorldManager;
use blockforge_server::config::ServerConfig;
use blockforge_server::{autosave, bootstrap};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path: PathBuf = std::env::args()
        .skip_while(|a| a != "--config")
        .nth(1)
        .unwrap_or_else(|| "config.toml".into())
        .into();

    let fresh_config = !config_path.exists();
    let config = ServerConfig::load_or_default(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("blockforge server, config {}", config_path.display());
    if fresh_config {
        tracing::info!("Wrote default config to {}", config_path.display());
    }

    // ── Open or create the world ─────────────────────────────────────────
    // World generation and settling are CPU-bound; keep them off the runtime.
    let world_config = config.world.clone();
    let debug = config.debug.clone();
    let world =
        tokio::task::spawn_blocking(move || bootstrap::open_world(&world_config, &debug)).await??;

    let manager = Arc::new(WorldManager::new());
    manager.add_world(Arc::clone(&world));
    tracing::info!(
        "World '{}' ready: {} chunks in memory (seed {}, generator {})",
        world.name(),
        world.loaded_chunks(),
        world.seed(),
        world.generator_name()
    );

    // ── Periodic autosave ────────────────────────────────────────────────
    let autosave = autosave::start(Arc::clone(&manager), config.autosave.interval());

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
    tracing::info!("Ctrl+C received, shutting down...");

    // ── Save on shutdown ─────────────────────────────────────────────────
    if autosave.stop(config.autosave.shutdown_timeout()).await {
        tracing::info!("Shutdown save complete");
    }
    Ok(())
}
