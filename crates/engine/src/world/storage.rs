//! The persistence seam: where a world's records physically live.

use std::sync::Mutex;

use dashmap::DashMap;

use super::position::ChunkPos;
use crate::error::StorageResult;

/// Byte-level record store for one world.
///
/// The engine owns the encoding of every record; a backend only decides
/// placement and compression. All methods take `&self` so one backend can
/// serve loads from session threads while the autosave writes.
pub trait ChunkStorage: Send + Sync {
    /// The world root record, or `None` if this world was never created.
    fn read_root(&self) -> StorageResult<Option<Vec<u8>>>;

    fn write_root(&self, bytes: &[u8]) -> StorageResult<()>;

    /// Every chunk position that currently has a record.
    fn stored_chunks(&self) -> StorageResult<Vec<ChunkPos>>;

    fn read_chunk(&self, pos: ChunkPos) -> StorageResult<Option<Vec<u8>>>;

    fn write_chunk(&self, pos: ChunkPos, bytes: &[u8]) -> StorageResult<()>;

    /// Push buffered writes down to durable storage.
    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Volatile backend holding records in memory. Used for tests and for
/// throwaway worlds that never touch disk.
#[derive(Default)]
pub struct MemoryStorage {
    root: Mutex<Option<Vec<u8>>>,
    chunks: DashMap<ChunkPos, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Overwrite a chunk record with arbitrary bytes (corruption tests).
    pub fn put_raw_chunk(&self, pos: ChunkPos, bytes: Vec<u8>) {
        self.chunks.insert(pos, bytes);
    }

    pub fn put_raw_root(&self, bytes: Vec<u8>) {
        *self.root.lock().expect("memory storage poisoned") = Some(bytes);
    }
}

impl ChunkStorage for MemoryStorage {
    fn read_root(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.root.lock().expect("memory storage poisoned").clone())
    }

    fn write_root(&self, bytes: &[u8]) -> StorageResult<()> {
        self.put_raw_root(bytes.to_vec());
        Ok(())
    }

    fn stored_chunks(&self) -> StorageResult<Vec<ChunkPos>> {
        Ok(self.chunks.iter().map(|entry| *entry.key()).collect())
    }

    fn read_chunk(&self, pos: ChunkPos) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.chunks.get(&pos).map(|bytes| bytes.clone()))
    }

    fn write_chunk(&self, pos: ChunkPos, bytes: &[u8]) -> StorageResult<()> {
        self.chunks.insert(pos, bytes.to_vec());
        Ok(())
    }
}
