use super::chunk::Chunk;
use super::position::ChunkPos;

/// Pluggable terrain source.
///
/// Implementations must be pure: the same `(seed, pos)` yields byte-identical
/// chunk contents on every call, across restarts and machines, and never
/// reads any other chunk. This is what lets chunks be generated lazily, in
/// any order, and in parallel.
pub trait TerrainGenerator: Send + Sync {
    /// Stable name recorded in the world root (e.g. `"standard"`).
    fn name(&self) -> &'static str;

    /// Produce the chunk at `pos` for a world with `seed`.
    fn generate(&self, seed: u64, pos: ChunkPos) -> Chunk;
}
