//! World persistence using Minecraft's Anvil region file format (.mca).
//!
//! Chunk records live in `<dir>/region/r.X.Z.mca` (32x32 chunks per file,
//! zlib-compressed by fastanvil); the world root lives in a gzip-compressed
//! `<dir>/level.dat`. The engine owns the record bytes; this module only
//! decides where they go.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use dashmap::{DashMap, DashSet};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use blockforge_engine::error::{StorageError, StorageResult};
use blockforge_engine::world::position::ChunkPos;
use blockforge_engine::world::storage::ChunkStorage;

const REGION_SIZE: i32 = 32;
/// Length of a region file's location table: 1024 big-endian u32 entries.
const LOCATION_TABLE: usize = 4096;
const ROOT_FILE: &str = "level.dat";
const ROOT_TEMP: &str = "level.dat.tmp";

type RegionKey = (i32, i32);

/// Region coordinates of `pos` and its slot within that region.
fn region_of(pos: ChunkPos) -> (RegionKey, (usize, usize)) {
    (
        (pos.x.div_euclid(REGION_SIZE), pos.z.div_euclid(REGION_SIZE)),
        (
            pos.x.rem_euclid(REGION_SIZE) as usize,
            pos.z.rem_euclid(REGION_SIZE) as usize,
        ),
    )
}

/// Parse region coordinates from a filename: `r.X.Z.mca`.
fn parse_region_name(name: &str) -> Option<RegionKey> {
    let parts: Vec<&str> = name.strip_suffix(".mca")?.split('.').collect();
    match parts.as_slice() {
        ["r", x, z] => Some((x.parse().ok()?, z.parse().ok()?)),
        _ => None,
    }
}

fn backend(e: fastanvil::Error) -> StorageError {
    StorageError::Backend(format!("region file: {e}"))
}

/// fastanvil failures while parsing an existing file: a damaged header, a bad
/// sector offset, an unknown compression byte or a broken zlib stream.
fn corrupt(e: fastanvil::Error) -> StorageError {
    StorageError::Corrupt(format!("region file: {e}"))
}

/// [`ChunkStorage`] over a world directory of Anvil region files.
///
/// Each region file is guarded by its own mutex, so loads and saves touching
/// different regions run in parallel while two writers never interleave in
/// one file.
pub struct RegionStorage {
    dir: PathBuf,
    locks: DashMap<RegionKey, Arc<Mutex<()>>>,
    /// Regions written since the last flush.
    touched: DashSet<RegionKey>,
}

impl RegionStorage {
    /// Open (creating if needed) the world directory at `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let region_dir = dir.join("region");
        fs::create_dir_all(&region_dir)
            .with_context(|| format!("creating region directory {}", region_dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            locks: DashMap::new(),
            touched: DashSet::new(),
        })
    }

    fn region_dir(&self) -> PathBuf {
        self.dir.join("region")
    }

    fn region_path(&self, (rx, rz): RegionKey) -> PathBuf {
        self.region_dir().join(format!("r.{}.{}.mca", rx, rz))
    }

    fn lock(&self, key: RegionKey) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(key).or_default().value())
    }

    /// Chunk slots present in one region file, from its location table.
    fn indexed_chunks(&self, key: RegionKey, path: &Path) -> StorageResult<Vec<ChunkPos>> {
        let lock = self.lock(key);
        let _guard = lock.lock().expect("region lock poisoned");

        let mut table = [0u8; LOCATION_TABLE];
        let mut file = File::open(path)?;
        if let Err(e) = file.read_exact(&mut table) {
            tracing::warn!("Skipping truncated region file {}: {}", path.display(), e);
            return Ok(Vec::new());
        }

        let (rx, rz) = key;
        Ok(table
            .chunks_exact(4)
            .enumerate()
            .filter(|(_, entry)| entry.iter().any(|&b| b != 0))
            .map(|(i, _)| {
                let (x, z) = (i as i32 % REGION_SIZE, i as i32 / REGION_SIZE);
                ChunkPos::new(rx * REGION_SIZE + x, rz * REGION_SIZE + z)
            })
            .collect())
    }
}

impl ChunkStorage for RegionStorage {
    fn read_root(&self) -> StorageResult<Option<Vec<u8>>> {
        let path = self.dir.join(ROOT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        GzDecoder::new(File::open(&path)?).read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    /// Written beside the live file and renamed over it, so a crash leaves
    /// either the old root or the new one.
    fn write_root(&self, bytes: &[u8]) -> StorageResult<()> {
        let temp = self.dir.join(ROOT_TEMP);
        let mut encoder = GzEncoder::new(File::create(&temp)?, Compression::default());
        encoder.write_all(bytes)?;
        encoder.finish()?.sync_all()?;
        fs::rename(&temp, self.dir.join(ROOT_FILE))?;
        Ok(())
    }

    fn stored_chunks(&self) -> StorageResult<Vec<ChunkPos>> {
        let region_dir = self.region_dir();
        if !region_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        for entry in fs::read_dir(&region_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(key) = parse_region_name(name) else {
                tracing::warn!("Skipping unexpected file in region dir: {}", name);
                continue;
            };
            chunks.extend(self.indexed_chunks(key, &path)?);
        }
        Ok(chunks)
    }

    fn read_chunk(&self, pos: ChunkPos) -> StorageResult<Option<Vec<u8>>> {
        let (key, (x, z)) = region_of(pos);
        let path = self.region_path(key);
        let lock = self.lock(key);
        let _guard = lock.lock().expect("region lock poisoned");

        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        let mut region = fastanvil::Region::from_stream(file).map_err(corrupt)?;
        region.read_chunk(x, z).map_err(corrupt)
    }

    fn write_chunk(&self, pos: ChunkPos, bytes: &[u8]) -> StorageResult<()> {
        let (key, (x, z)) = region_of(pos);
        let path = self.region_path(key);
        let lock = self.lock(key);
        let _guard = lock.lock().expect("region lock poisoned");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let mut region = if file.metadata()?.len() == 0 {
            fastanvil::Region::new(file).map_err(backend)?
        } else {
            fastanvil::Region::from_stream(file).map_err(backend)?
        };
        region.write_chunk(x, z, bytes).map_err(backend)?;
        self.touched.insert(key);
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        let keys: Vec<RegionKey> = self.touched.iter().map(|key| *key).collect();
        for key in keys {
            let lock = self.lock(key);
            let _guard = lock.lock().expect("region lock poisoned");
            File::open(self.region_path(key))?.sync_all()?;
            self.touched.remove(&key);
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
