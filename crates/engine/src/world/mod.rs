pub mod block;
pub mod chunk;
pub mod generator;
pub mod position;
pub mod region;
pub mod root;
pub mod storage;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use rayon::prelude::*;

use crate::error::{StorageError, WorldError, WorldResult};
use crate::rules::BlockRegistry;
use block::BlockData;
use chunk::Chunk;
use generator::TerrainGenerator;
use position::{BlockPos, ChunkPos};
use region::{ChunkRegion, PassOrder};
use root::WorldRoot;
use storage::ChunkStorage;

/// A materialized chunk. Block reads share the lock; writes are exclusive,
/// which keeps the height cache consistent per chunk.
pub type SharedChunk = Arc<RwLock<Chunk>>;

// ── Per-coordinate materialization slot ──────────────────────────────────────

enum SlotState {
    /// One thread is loading or generating; everyone else waits.
    Loading,
    Ready(SharedChunk),
    /// The loader failed and removed the slot from the map.
    Abandoned,
}

/// The synchronization point for one coordinate. A coordinate absent from
/// the slot map has never been requested; a present slot is either loading
/// or ready. Exactly one thread ever moves a slot out of `Loading`.
struct ChunkSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl ChunkSlot {
    fn loading() -> Self {
        Self {
            state: Mutex::new(SlotState::Loading),
            ready: Condvar::new(),
        }
    }

    fn finish(&self, state: SlotState) {
        *self.state.lock().expect("chunk slot poisoned") = state;
        self.ready.notify_all();
    }

    /// The chunk, if this slot has finished loading.
    fn try_ready(&self) -> Option<SharedChunk> {
        match &*self.state.lock().expect("chunk slot poisoned") {
            SlotState::Ready(chunk) => Some(Arc::clone(chunk)),
            _ => None,
        }
    }

    /// Block until the loader finishes. `None` means it gave up.
    fn wait(&self) -> Option<SharedChunk> {
        let mut state = self.state.lock().expect("chunk slot poisoned");
        loop {
            match &*state {
                SlotState::Loading => {
                    state = self.ready.wait(state).expect("chunk slot poisoned");
                }
                SlotState::Ready(chunk) => return Some(Arc::clone(chunk)),
                SlotState::Abandoned => return None,
            }
        }
    }
}

/// Held by the thread materializing a slot. Unless disarmed after success,
/// dropping it (on an error return or a panic) removes the slot and wakes
/// the waiters so they retry.
struct LoadGuard<'a> {
    slots: &'a DashMap<ChunkPos, Arc<ChunkSlot>>,
    slot: &'a ChunkSlot,
    pos: ChunkPos,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.slots.remove(&self.pos);
            self.slot.finish(SlotState::Abandoned);
        }
    }
}

// ── Reports ──────────────────────────────────────────────────────────────────

/// Outcome of one [`WorldStore::save`] call.
#[derive(Debug, Default, Clone)]
pub struct SaveReport {
    /// Chunks written and acknowledged.
    pub saved: usize,
    /// In-memory chunks that had nothing to write.
    pub clean: usize,
    /// Chunks whose write failed; they stay dirty for the next save.
    pub failed: Vec<ChunkPos>,
    pub elapsed: Duration,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Materialization counters since the store was opened.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub loaded: usize,
    pub generated: usize,
    /// Chunks whose stored record was corrupt and got regenerated.
    pub regenerated: usize,
    pub in_memory: usize,
}

#[derive(Default)]
struct Counters {
    loaded: AtomicUsize,
    generated: AtomicUsize,
    regenerated: AtomicUsize,
}

// ── WorldStore ───────────────────────────────────────────────────────────────

/// All chunks of one named world, and the only authority on whether a chunk
/// exists yet.
///
/// Chunks materialize lazily on first request: memory, then storage, then
/// the terrain generator. Thread-safe: the slot map is sharded (`DashMap`)
/// and each chunk carries its own lock, so sessions, the settling pass and
/// the autosave never contend on a world-wide lock.
pub struct WorldStore {
    name: String,
    seed: u64,
    created: bool,
    generator: Arc<dyn TerrainGenerator>,
    storage: Arc<dyn ChunkStorage>,
    registry: Arc<BlockRegistry>,
    slots: DashMap<ChunkPos, Arc<ChunkSlot>>,
    /// Chunks with a record in storage.
    persisted: DashSet<ChunkPos>,
    counters: Counters,
}

impl WorldStore {
    /// Reopen the world stored in `storage`, or create it with `seed` if the
    /// storage holds no world root yet.
    ///
    /// A corrupt root is fatal and returned as `StorageCorrupt`; this never
    /// falls back to a fresh world on its own. The generator is probed for
    /// determinism before the store is handed out.
    pub fn load_or_create(
        name: &str,
        seed: u64,
        generator: Arc<dyn TerrainGenerator>,
        storage: Arc<dyn ChunkStorage>,
        registry: Arc<BlockRegistry>,
    ) -> WorldResult<WorldStore> {
        let (root, created) = match storage.read_root()? {
            Some(bytes) => {
                let root = WorldRoot::decode(&bytes)?;
                if root.name != name {
                    tracing::warn!(
                        "World root is named '{}', opened as '{}'; keeping the stored name",
                        root.name,
                        name
                    );
                }
                if root.generator != generator.name() {
                    tracing::warn!(
                        "World '{}' was generated by '{}' but is opened with '{}'; new chunks will not match",
                        root.name,
                        root.generator,
                        generator.name()
                    );
                }
                (root, false)
            }
            None => {
                let root = WorldRoot {
                    name: name.to_string(),
                    seed,
                    generator: generator.name().to_string(),
                };
                (root, true)
            }
        };

        verify_generator(generator.as_ref(), root.seed)?;
        // A world only exists once a working generator is known.
        if created {
            storage
                .write_root(&root.encode()?)
                .map_err(|source| WorldError::PersistenceFailure {
                    record: "world root".into(),
                    source,
                })?;
        }

        let persisted = DashSet::new();
        for pos in storage.stored_chunks()? {
            persisted.insert(pos);
        }

        if created {
            tracing::info!("Created world '{}' (seed {})", root.name, root.seed);
        } else {
            tracing::info!(
                "Opened world '{}' (seed {}, {} stored chunks)",
                root.name,
                root.seed,
                persisted.len()
            );
        }

        Ok(WorldStore {
            name: root.name,
            seed: root.seed,
            created,
            generator,
            storage,
            registry,
            slots: DashMap::new(),
            persisted,
            counters: Counters::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether this store created its world (no root existed).
    pub fn was_created(&self) -> bool {
        self.created
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    // ── Chunk access ─────────────────────────────────────────────────────

    /// The chunk at `pos`, materializing it if needed.
    ///
    /// Concurrent callers for the same unmaterialized coordinate share one
    /// load-or-generate: the first caller does the work, the rest block on
    /// the slot and receive the same `Arc`.
    ///
    /// A corrupt stored record is logged and regenerated. Errors are storage
    /// read failures and generator contract violations.
    pub fn get_chunk(&self, pos: ChunkPos) -> WorldResult<SharedChunk> {
        loop {
            if let Some(chunk) = self.peek_chunk(pos) {
                return Ok(chunk);
            }

            let (slot, owner) = match self.slots.entry(pos) {
                Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
                Entry::Vacant(entry) => {
                    let slot = Arc::new(ChunkSlot::loading());
                    entry.insert(Arc::clone(&slot));
                    (slot, true)
                }
            };

            if !owner {
                match slot.wait() {
                    Some(chunk) => return Ok(chunk),
                    // The loader failed; take a turn ourselves.
                    None => continue,
                }
            }

            let mut guard = LoadGuard {
                slots: &self.slots,
                slot: &slot,
                pos,
                armed: true,
            };
            let chunk = self.materialize(pos)?;
            guard.armed = false;

            let shared = Arc::new(RwLock::new(chunk));
            slot.finish(SlotState::Ready(Arc::clone(&shared)));
            return Ok(shared);
        }
    }

    /// The chunk at `pos` if it is already in memory. Never loads or generates.
    pub fn peek_chunk(&self, pos: ChunkPos) -> Option<SharedChunk> {
        let slot = self.slots.get(&pos).map(|entry| Arc::clone(entry.value()))?;
        slot.try_ready()
    }

    fn materialize(&self, pos: ChunkPos) -> WorldResult<Chunk> {
        if self.persisted.contains(&pos) {
            let decoded = match self.storage.read_chunk(pos) {
                Ok(Some(bytes)) => Some(decode_stored(pos, &bytes)),
                Ok(None) => {
                    self.persisted.remove(&pos);
                    None
                }
                Err(StorageError::Corrupt(reason)) => {
                    Some(Err(WorldError::corrupt_chunk(pos, reason)))
                }
                Err(e) => return Err(e.into()),
            };
            match decoded {
                Some(Ok(chunk)) => {
                    self.counters.loaded.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Loaded chunk ({}, {}) from storage", pos.x, pos.z);
                    return Ok(chunk);
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        "World '{}': {}; regenerating chunk ({}, {})",
                        self.name,
                        e,
                        pos.x,
                        pos.z
                    );
                    self.counters.regenerated.fetch_add(1, Ordering::Relaxed);
                }
                None => {}
            }
        }

        let mut chunk = generate_checked(self.generator.as_ref(), self.seed, pos)?;
        // Never saved before: the whole chunk needs writing.
        chunk.mark_dirty();
        self.counters.generated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Generated chunk ({}, {})", pos.x, pos.z);
        Ok(chunk)
    }

    /// Materialize every chunk of `region` in parallel. `progress` receives
    /// `(done, total)` after each chunk; `done` is strictly increasing per
    /// call but calls may arrive from several threads.
    pub fn materialize_region(
        &self,
        region: ChunkRegion,
        progress: impl Fn(usize, usize) + Sync,
    ) -> WorldResult<usize> {
        let positions = region.positions(PassOrder::ColumnMajor);
        let total = positions.len();
        let done = AtomicUsize::new(0);
        positions.par_iter().try_for_each(|&pos| -> WorldResult<()> {
            self.get_chunk(pos)?;
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress(n, total);
            Ok(())
        })?;
        Ok(total)
    }

    // ── Block access by world position ───────────────────────────────────

    pub fn get_block(&self, pos: BlockPos) -> WorldResult<BlockData> {
        check_height(pos)?;
        let chunk = self.get_chunk(pos.chunk())?;
        let guard = chunk.read().expect("chunk lock poisoned");
        guard.get(pos.local())
    }

    pub fn set_block(&self, pos: BlockPos, data: BlockData) -> WorldResult<()> {
        check_height(pos)?;
        let chunk = self.get_chunk(pos.chunk())?;
        let mut guard = chunk.write().expect("chunk lock poisoned");
        guard.set(pos.local(), data)
    }

    /// Read a block only if its chunk is in memory and `y` is in range.
    pub fn peek_block(&self, pos: BlockPos) -> Option<BlockData> {
        if !pos.in_height_range() {
            return None;
        }
        let chunk = self.peek_chunk(pos.chunk())?;
        let guard = chunk.read().expect("chunk lock poisoned");
        guard.get(pos.local()).ok()
    }

    /// Write a block only if its chunk is already in memory. Returns whether
    /// the write happened.
    pub fn set_block_if_loaded(&self, pos: BlockPos, data: BlockData) -> WorldResult<bool> {
        check_height(pos)?;
        let Some(chunk) = self.peek_chunk(pos.chunk()) else {
            return Ok(false);
        };
        let mut guard = chunk.write().expect("chunk lock poisoned");
        guard.set(pos.local(), data)?;
        Ok(true)
    }

    // ── Persistence ──────────────────────────────────────────────────────

    fn ready_chunks(&self) -> Vec<(ChunkPos, SharedChunk)> {
        self.slots
            .iter()
            .filter_map(|entry| entry.value().try_ready().map(|chunk| (*entry.key(), chunk)))
            .collect()
    }

    /// Persist every dirty in-memory chunk.
    ///
    /// Each chunk is serialized under its own read lock, so gameplay writes
    /// to other chunks proceed during the save. A failed write is logged once
    /// and leaves that chunk dirty for the next call; it never aborts the
    /// rest of the batch. Chunks are acknowledged only after the storage
    /// flush succeeds.
    pub fn save(&self) -> SaveReport {
        let start = Instant::now();
        let mut report = SaveReport::default();
        let mut written: Vec<(ChunkPos, SharedChunk, u64)> = Vec::new();

        for (pos, shared) in self.ready_chunks() {
            let snapshot = {
                let chunk = shared.read().expect("chunk lock poisoned");
                if !chunk.is_dirty() {
                    report.clean += 1;
                    continue;
                }
                chunk.serialize().map(|bytes| (chunk.revision(), bytes))
            };

            let result = snapshot.and_then(|(revision, bytes)| {
                self.storage
                    .write_chunk(pos, &bytes)
                    .map(|()| revision)
                    .map_err(|source| WorldError::PersistenceFailure {
                        record: format!("chunk ({}, {})", pos.x, pos.z),
                        source,
                    })
            });
            match result {
                Ok(revision) => written.push((pos, shared, revision)),
                Err(e) => {
                    tracing::warn!("World '{}': {}", self.name, e);
                    report.failed.push(pos);
                }
            }
        }

        match self.storage.flush() {
            Ok(()) => {
                for (pos, shared, revision) in written {
                    shared
                        .write()
                        .expect("chunk lock poisoned")
                        .mark_saved(revision);
                    self.persisted.insert(pos);
                    report.saved += 1;
                }
            }
            Err(e) => {
                tracing::error!(
                    "World '{}': storage flush failed, {} chunks stay dirty: {}",
                    self.name,
                    written.len(),
                    e
                );
                report.failed.extend(written.into_iter().map(|(pos, _, _)| pos));
            }
        }

        report.elapsed = start.elapsed();
        if report.failed.is_empty() {
            tracing::info!(
                "World '{}' saved: {} dirty chunks ({:.2?})",
                self.name,
                report.saved,
                report.elapsed
            );
        } else {
            tracing::warn!(
                "World '{}' saved {} chunks, {} failed and stay dirty ({:.2?})",
                self.name,
                report.saved,
                report.failed.len(),
                report.elapsed
            );
        }
        report
    }

    // ── Introspection ────────────────────────────────────────────────────

    /// Number of chunks currently in memory.
    pub fn loaded_chunks(&self) -> usize {
        self.ready_chunks().len()
    }

    /// Positions of in-memory chunks with unsaved changes.
    pub fn dirty_chunks(&self) -> Vec<ChunkPos> {
        let mut dirty: Vec<ChunkPos> = self
            .ready_chunks()
            .into_iter()
            .filter(|(_, chunk)| chunk.read().expect("chunk lock poisoned").is_dirty())
            .map(|(pos, _)| pos)
            .collect();
        dirty.sort();
        dirty
    }

    /// Whether `pos` has a record in storage.
    pub fn is_persisted(&self, pos: ChunkPos) -> bool {
        self.persisted.contains(&pos)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            loaded: self.counters.loaded.load(Ordering::Relaxed),
            generated: self.counters.generated.load(Ordering::Relaxed),
            regenerated: self.counters.regenerated.load(Ordering::Relaxed),
            in_memory: self.loaded_chunks(),
        }
    }
}

fn check_height(pos: BlockPos) -> WorldResult<()> {
    if pos.in_height_range() {
        return Ok(());
    }
    let local = pos.local();
    Err(WorldError::OutOfBounds {
        x: local.x as i32,
        y: pos.y.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        z: local.z as i32,
    })
}

fn decode_stored(pos: ChunkPos, bytes: &[u8]) -> WorldResult<Chunk> {
    let chunk = Chunk::deserialize(bytes).map_err(|e| match e {
        WorldError::StorageCorrupt { reason, .. } => WorldError::corrupt_chunk(pos, reason),
        other => other,
    })?;
    if chunk.pos() != pos {
        return Err(WorldError::corrupt_chunk(
            pos,
            format!("record belongs to ({}, {})", chunk.pos().x, chunk.pos().z),
        ));
    }
    Ok(chunk)
}

/// Run the generator, turning a panic or a chunk for the wrong coordinate
/// into `GenerationFailure`.
fn generate_checked(generator: &dyn TerrainGenerator, seed: u64, pos: ChunkPos) -> WorldResult<Chunk> {
    let failure = |reason: String| WorldError::GenerationFailure {
        generator: generator.name().to_string(),
        reason,
    };
    let chunk = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(seed, pos)))
        .map_err(|_| failure(format!("panicked generating chunk ({}, {})", pos.x, pos.z)))?;
    if chunk.pos() != pos {
        return Err(failure(format!(
            "asked for chunk ({}, {}), got ({}, {})",
            pos.x,
            pos.z,
            chunk.pos().x,
            chunk.pos().z
        )));
    }
    Ok(chunk)
}

/// Generate the origin chunk twice and require identical output.
fn verify_generator(generator: &dyn TerrainGenerator, seed: u64) -> WorldResult<()> {
    let origin = ChunkPos::new(0, 0);
    let first = generate_checked(generator, seed, origin)?;
    let second = generate_checked(generator, seed, origin)?;
    if first != second {
        return Err(WorldError::GenerationFailure {
            generator: generator.name().to_string(),
            reason: "two generations of chunk (0, 0) differ".into(),
        });
    }
    Ok(())
}
