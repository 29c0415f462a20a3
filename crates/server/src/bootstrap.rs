//! Opening the configured world at startup, including spawn preparation for
//! a world that did not exist yet.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};

use blockforge_engine::settle::SettlingPass;
use blockforge_engine::world::WorldStore;
use blockforge_engine::world::generator::TerrainGenerator;
use blockforge_engine::world::position::ChunkPos;
use blockforge_engine::world::region::{ChunkRegion, PassOrder};

use crate::config::{DebugSection, WorldSection};
use crate::persistence::RegionStorage;
use crate::{rules, terrain};

/// Open the world described by `config`, creating it if needed.
///
/// A world that fails to load is moved aside and recreated only when
/// `regenerate_on_load_failure` is set; otherwise the error is returned and
/// the damaged files are left untouched.
pub fn open_world(config: &WorldSection, debug: &DebugSection) -> Result<Arc<WorldStore>> {
    let dir = config.directory.as_path();
    if debug.delete_world_on_startup && dir.exists() {
        tracing::warn!("Deleting world directory {} (debug.delete_world_on_startup)", dir.display());
        std::fs::remove_dir_all(dir).with_context(|| format!("deleting {}", dir.display()))?;
    }

    let generator = terrain::by_name(&config.generator).ok_or_else(|| {
        anyhow!(
            "unknown generator '{}' (expected one of: {})",
            config.generator,
            terrain::GENERATORS.join(", ")
        )
    })?;

    let store = match load(config, Arc::clone(&generator)) {
        Ok(store) => store,
        Err(e) if config.regenerate_on_load_failure => {
            tracing::error!("World '{}' failed to load: {:#}", config.name, e);
            let aside = move_aside(dir)?;
            tracing::warn!("Moved damaged world to {}; creating a fresh one", aside.display());
            load(config, generator)?
        }
        Err(e) => return Err(e),
    };

    if store.was_created() {
        prepare_spawn(&store, config.spawn_radius)?;
    }
    Ok(Arc::new(store))
}

fn load(config: &WorldSection, generator: Arc<dyn TerrainGenerator>) -> Result<WorldStore> {
    let dir = &config.directory;
    let storage = RegionStorage::open(dir)?;
    WorldStore::load_or_create(
        &config.name,
        config.seed(),
        generator,
        Arc::new(storage),
        Arc::new(rules::standard_registry()),
    )
    .with_context(|| format!("opening world '{}' at {}", config.name, dir.display()))
}

/// `world` becomes `world.corrupt-<unix secs>` beside it.
fn quarantine_path(dir: &Path, secs: u64) -> PathBuf {
    let mut name = dir.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "world".into());
    name.push(format!(".corrupt-{}", secs));
    dir.with_file_name(name)
}

fn move_aside(dir: &Path) -> Result<PathBuf> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let aside = quarantine_path(dir, secs);
    std::fs::rename(dir, &aside)
        .with_context(|| format!("moving {} to {}", dir.display(), aside.display()))?;
    Ok(aside)
}

/// Generate the spawn region `[-radius, radius)` on both axes, settle it and
/// persist it, so nobody ever observes unsettled terrain.
pub fn prepare_spawn(store: &WorldStore, radius: i32) -> Result<()> {
    let start = Instant::now();
    let region = ChunkRegion::square(ChunkPos::new(0, 0), radius);
    tracing::info!("Preparing spawn area for '{}': {} chunks", store.name(), region.len());

    let logged = AtomicUsize::new(0);
    store
        .materialize_region(region, |done, total| {
            if let Some(decile) = next_decile(&logged, done, total) {
                tracing::info!("Preparing spawn area: {}%", decile * 10);
            }
        })
        .with_context(|| format!("generating spawn area of '{}'", store.name()))?;

    let report = SettlingPass::new(PassOrder::ColumnMajor).run(store, region);
    if !report.is_clean() {
        tracing::warn!(
            "Spawn settling for '{}' finished with {} failed updates",
            store.name(),
            report.failures.len()
        );
    }

    let saved = store.save();
    if !saved.is_complete() {
        tracing::warn!(
            "{} spawn chunks of '{}' could not be saved yet; autosave will retry",
            saved.failed.len(),
            store.name()
        );
    }
    tracing::info!("Spawn area ready ({:.2?})", start.elapsed());
    Ok(())
}

/// Progress callbacks arrive from several threads; only report a decile
/// that is strictly above every decile reported before it.
fn next_decile(logged: &AtomicUsize, done: usize, total: usize) -> Option<usize> {
    if total == 0 {
        return None;
    }
    let decile = done * 10 / total;
    let previous = logged.fetch_max(decile, Ordering::Relaxed);
    (decile > previous).then_some(decile)
}
