use std::fmt;

use fastnbt::ByteArray;
use serde::{Deserialize, Serialize};

use super::block::{BlockData, BlockId};
use super::position::{ChunkPos, LocalBlockPos};
use crate::error::{StorageError, WorldError, WorldResult};

/// Blocks along the x axis of a chunk.
pub const WIDTH: usize = 16;
/// Blocks along the y axis of a chunk (the whole world height).
pub const HEIGHT: usize = 128;
/// Blocks along the z axis of a chunk.
pub const DEPTH: usize = 16;
/// Number of columns in one chunk.
pub const AREA: usize = WIDTH * DEPTH;
/// Total block count in one chunk.
pub const VOLUME: usize = AREA * HEIGHT;

/// Version tag written into every serialized chunk record.
pub const CHUNK_FORMAT_VERSION: i32 = 1;

/// A 16x128x16 column of blocks with a per-column height cache.
///
/// Blocks are stored densely in XZY order (`(x * 16 + z) * 128 + y`) so
/// vertical scans (height recompute, settling) walk contiguous memory.
///
/// Dirty tracking is revision-based: every mutation bumps `revision`, and a
/// chunk is dirty while `revision != saved_revision`. The saver acknowledges
/// exactly the revision it serialized, so writes racing with a save are never
/// lost.
#[derive(Clone)]
pub struct Chunk {
    pos: ChunkPos,
    blocks: Box<[BlockData]>,
    /// `top + 1` of each column; 0 means the column is empty.
    heights: [u8; AREA],
    biomes: [u8; AREA],
    revision: u64,
    saved_revision: u64,
    settled: bool,
}

#[inline]
const fn index(x: usize, y: usize, z: usize) -> usize {
    (x * DEPTH + z) * HEIGHT + y
}

#[inline]
const fn column(x: usize, z: usize) -> usize {
    x * DEPTH + z
}

impl Chunk {
    /// An all-air, unsettled chunk.
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            blocks: vec![BlockData::AIR; VOLUME].into_boxed_slice(),
            heights: [0; AREA],
            biomes: [0; AREA],
            revision: 0,
            saved_revision: 0,
            settled: false,
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    fn slot(pos: LocalBlockPos) -> WorldResult<usize> {
        if !pos.in_bounds() {
            return Err(WorldError::OutOfBounds {
                x: pos.x as i32,
                y: pos.y,
                z: pos.z as i32,
            });
        }
        Ok(index(pos.x as usize, pos.y as usize, pos.z as usize))
    }

    pub fn get(&self, pos: LocalBlockPos) -> WorldResult<BlockData> {
        Ok(self.blocks[Self::slot(pos)?])
    }

    /// Write a block, keep the column's height cache exact and dirty the chunk.
    ///
    /// The cache only rescans downward when the write removes the current top.
    pub fn set(&mut self, pos: LocalBlockPos, data: BlockData) -> WorldResult<()> {
        let idx = Self::slot(pos)?;
        self.blocks[idx] = data;
        self.revision += 1;

        let (x, y, z) = (pos.x as usize, pos.y as usize, pos.z as usize);
        let col = column(x, z);
        let top = self.heights[col] as usize;
        if !data.is_air() {
            if y + 1 > top {
                self.heights[col] = (y + 1) as u8;
            }
        } else if y + 1 == top {
            self.heights[col] = self.scan_height(x, z, y);
        }
        Ok(())
    }

    /// `top + 1` of the highest occupied block strictly below `below`.
    fn scan_height(&self, x: usize, z: usize, below: usize) -> u8 {
        (0..below)
            .rev()
            .find(|&y| !self.blocks[index(x, y, z)].is_air())
            .map_or(0, |y| (y + 1) as u8)
    }

    /// Highest occupied y in the column, or `None` for an empty column.
    /// Columns outside the chunk report as empty.
    #[inline]
    pub fn height_at(&self, x: u8, z: u8) -> Option<u8> {
        if x as usize >= WIDTH || z as usize >= DEPTH {
            return None;
        }
        match self.heights[column(x as usize, z as usize)] {
            0 => None,
            h => Some(h - 1),
        }
    }

    pub fn biome(&self, x: u8, z: u8) -> u8 {
        self.biomes[column(x as usize % WIDTH, z as usize % DEPTH)]
    }

    pub fn set_biome(&mut self, x: u8, z: u8, biome: u8) {
        self.biomes[column(x as usize % WIDTH, z as usize % DEPTH)] = biome;
        self.revision += 1;
    }

    /// Number of non-air blocks.
    pub fn occupied_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_air()).count()
    }

    // ── Bookkeeping ──────────────────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Force the chunk dirty even if no block changed (freshly generated).
    pub fn mark_dirty(&mut self) {
        self.revision += 1;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record that `revision` reached storage. A later revision stays dirty.
    pub fn mark_saved(&mut self, revision: u64) {
        if revision > self.saved_revision {
            self.saved_revision = revision;
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn mark_settled(&mut self) {
        self.settled = true;
    }

    // ── Encoding ─────────────────────────────────────────────────────────

    /// Encode the chunk as a versioned NBT record.
    pub fn serialize(&self) -> WorldResult<Vec<u8>> {
        let nbt = ChunkNbt {
            format_version: CHUNK_FORMAT_VERSION,
            x_pos: self.pos.x,
            z_pos: self.pos.z,
            blocks: ByteArray::new(self.blocks.iter().map(|b| b.id.0 as i8).collect()),
            data: ByteArray::new(self.blocks.iter().map(|b| b.metadata as i8).collect()),
            biomes: ByteArray::new(self.biomes.iter().map(|&b| b as i8).collect()),
        };
        fastnbt::to_bytes(&nbt).map_err(|e| WorldError::PersistenceFailure {
            record: format!("chunk ({}, {})", self.pos.x, self.pos.z),
            source: StorageError::Backend(e.to_string()),
        })
    }

    /// Decode a record produced by [`Chunk::serialize`]. The height cache is
    /// rebuilt from the block array; the result is clean and settled.
    pub fn deserialize(bytes: &[u8]) -> WorldResult<Chunk> {
        let nbt: ChunkNbt = fastnbt::from_bytes(bytes).map_err(|e| WorldError::StorageCorrupt {
            record: "chunk record".into(),
            reason: e.to_string(),
        })?;
        let pos = ChunkPos::new(nbt.x_pos, nbt.z_pos);

        if nbt.format_version != CHUNK_FORMAT_VERSION {
            return Err(WorldError::corrupt_chunk(
                pos,
                format!("unsupported format version {}", nbt.format_version),
            ));
        }
        if nbt.blocks.len() != VOLUME || nbt.data.len() != VOLUME {
            return Err(WorldError::corrupt_chunk(
                pos,
                format!(
                    "expected {VOLUME} blocks, found {} ids and {} metadata",
                    nbt.blocks.len(),
                    nbt.data.len()
                ),
            ));
        }
        if nbt.biomes.len() != AREA {
            return Err(WorldError::corrupt_chunk(
                pos,
                format!("expected {AREA} biomes, found {}", nbt.biomes.len()),
            ));
        }

        let blocks: Box<[BlockData]> = nbt
            .blocks
            .iter()
            .zip(nbt.data.iter())
            .map(|(&id, &meta)| BlockData::new(BlockId(id as u8), meta as u8))
            .collect();
        let mut biomes = [0u8; AREA];
        for (dst, &src) in biomes.iter_mut().zip(nbt.biomes.iter()) {
            *dst = src as u8;
        }

        let mut chunk = Chunk {
            pos,
            blocks,
            heights: [0; AREA],
            biomes,
            revision: 0,
            saved_revision: 0,
            settled: true,
        };
        for x in 0..WIDTH {
            for z in 0..DEPTH {
                chunk.heights[column(x, z)] = chunk.scan_height(x, z, HEIGHT);
            }
        }
        Ok(chunk)
    }
}

/// Compares contents (position, blocks, biomes). Dirty and settled
/// bookkeeping is ignored.
impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos && self.blocks == other.blocks && self.biomes == other.biomes
    }
}

impl Eq for Chunk {}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("occupied", &self.occupied_count())
            .field("dirty", &self.is_dirty())
            .field("settled", &self.settled)
            .finish()
    }
}

// ── Chunk NBT record (serde) ─────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug)]
struct ChunkNbt {
    #[serde(rename = "FormatVersion")]
    format_version: i32,
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,
    #[serde(rename = "Blocks")]
    blocks: ByteArray,
    #[serde(rename = "Data")]
    data: ByteArray,
    #[serde(rename = "Biomes")]
    biomes: ByteArray,
}

#[cfg(test)]
mod tests {
    use super::*;

    const STONE: BlockData = BlockData::of(BlockId(1));
    const SAND: BlockData = BlockData::of(BlockId(12));

    fn at(x: u8, y: i32, z: u8) -> LocalBlockPos {
        LocalBlockPos::new(x, y, z)
    }

    #[test]
    fn new_chunk_is_empty_and_clean() {
        let chunk = Chunk::new(ChunkPos::new(3, -2));
        assert_eq!(chunk.occupied_count(), 0);
        assert_eq!(chunk.height_at(0, 0), None);
        assert!(!chunk.is_dirty());
        assert!(!chunk.is_settled());
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        assert!(matches!(
            chunk.get(at(16, 0, 0)),
            Err(WorldError::OutOfBounds { x: 16, .. })
        ));
        assert!(matches!(
            chunk.set(at(0, 128, 0), STONE),
            Err(WorldError::OutOfBounds { y: 128, .. })
        ));
        assert!(matches!(
            chunk.get(at(0, -1, 0)),
            Err(WorldError::OutOfBounds { y: -1, .. })
        ));
        assert!(!chunk.is_dirty(), "rejected writes must not dirty the chunk");
    }

    #[test]
    fn height_tracks_top_block() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        chunk.set(at(4, 10, 7), STONE).unwrap();
        assert_eq!(chunk.height_at(4, 7), Some(10));

        chunk.set(at(4, 3, 7), STONE).unwrap();
        assert_eq!(chunk.height_at(4, 7), Some(10), "lower write keeps the top");

        chunk.set(at(4, 60, 7), SAND).unwrap();
        assert_eq!(chunk.height_at(4, 7), Some(60));

        // Removing the top rescans down to the next occupied block.
        chunk.set(at(4, 60, 7), BlockData::AIR).unwrap();
        assert_eq!(chunk.height_at(4, 7), Some(10));
        chunk.set(at(4, 10, 7), BlockData::AIR).unwrap();
        assert_eq!(chunk.height_at(4, 7), Some(3));
        chunk.set(at(4, 3, 7), BlockData::AIR).unwrap();
        assert_eq!(chunk.height_at(4, 7), None);

        // Neighbouring columns are untouched.
        assert_eq!(chunk.height_at(5, 7), None);
    }

    #[test]
    fn height_at_y_zero_is_distinct_from_empty() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        chunk.set(at(0, 0, 0), STONE).unwrap();
        assert_eq!(chunk.height_at(0, 0), Some(0));
        chunk.set(at(0, 127, 0), STONE).unwrap();
        assert_eq!(chunk.height_at(0, 0), Some(127));
    }

    #[test]
    fn removing_non_top_block_keeps_height() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        chunk.set(at(1, 5, 1), STONE).unwrap();
        chunk.set(at(1, 9, 1), STONE).unwrap();
        chunk.set(at(1, 5, 1), BlockData::AIR).unwrap();
        assert_eq!(chunk.height_at(1, 1), Some(9));
    }

    #[test]
    fn dirty_follows_revisions() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        chunk.set(at(0, 0, 0), STONE).unwrap();
        let snapshot = chunk.revision();
        assert!(chunk.is_dirty());

        // A write that lands after the snapshot survives the acknowledgement.
        chunk.set(at(0, 1, 0), STONE).unwrap();
        chunk.mark_saved(snapshot);
        assert!(chunk.is_dirty());

        chunk.mark_saved(chunk.revision());
        assert!(!chunk.is_dirty());

        // Stale acknowledgements never move the saved revision backwards.
        chunk.mark_saved(snapshot);
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn serialize_roundtrip_preserves_blocks_and_heights() {
        let mut chunk = Chunk::new(ChunkPos::new(-7, 12));
        for x in 0..16u8 {
            for z in 0..16u8 {
                let top = (x as i32 * 3 + z as i32) % 100;
                for y in 0..=top {
                    chunk.set(at(x, y, z), STONE).unwrap();
                }
                chunk
                    .set(at(x, top + 2, z), BlockData::new(BlockId(9), x ^ z))
                    .unwrap();
                chunk.set_biome(x, z, x.wrapping_mul(z));
            }
        }
        chunk.set(at(15, 127, 15), BlockData::new(BlockId(255), 255)).unwrap();

        let bytes = chunk.serialize().unwrap();
        let restored = Chunk::deserialize(&bytes).unwrap();

        assert_eq!(restored, chunk);
        assert_eq!(restored.pos(), ChunkPos::new(-7, 12));
        for x in 0..16u8 {
            for z in 0..16u8 {
                assert_eq!(restored.height_at(x, z), chunk.height_at(x, z));
                assert_eq!(restored.biome(x, z), chunk.biome(x, z));
            }
        }
        assert_eq!(
            restored.get(at(15, 127, 15)).unwrap(),
            BlockData::new(BlockId(255), 255)
        );
        assert!(!restored.is_dirty(), "loaded chunks start clean");
        assert!(restored.is_settled(), "loaded chunks count as settled");
    }

    #[test]
    fn serialize_is_byte_stable() {
        let mut a = Chunk::new(ChunkPos::new(1, 1));
        a.set(at(2, 40, 3), SAND).unwrap();
        let mut b = a.clone();
        b.mark_dirty();
        assert_eq!(a.serialize().unwrap(), b.serialize().unwrap());
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = Chunk::deserialize(&[0x0a, 0xff, 0x13, 0x37]).unwrap_err();
        assert!(err.is_corrupt(), "{err}");
    }

    #[test]
    fn wrong_version_is_corrupt() {
        let nbt = ChunkNbt {
            format_version: 99,
            x_pos: 0,
            z_pos: 0,
            blocks: ByteArray::new(vec![0; VOLUME]),
            data: ByteArray::new(vec![0; VOLUME]),
            biomes: ByteArray::new(vec![0; AREA]),
        };
        let bytes = fastnbt::to_bytes(&nbt).unwrap();
        let err = Chunk::deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("format version 99"), "{err}");
    }

    #[test]
    fn truncated_block_array_is_corrupt() {
        let nbt = ChunkNbt {
            format_version: CHUNK_FORMAT_VERSION,
            x_pos: 0,
            z_pos: 0,
            blocks: ByteArray::new(vec![1; 100]),
            data: ByteArray::new(vec![0; VOLUME]),
            biomes: ByteArray::new(vec![0; AREA]),
        };
        let bytes = fastnbt::to_bytes(&nbt).unwrap();
        assert!(Chunk::deserialize(&bytes).unwrap_err().is_corrupt());
    }
}
