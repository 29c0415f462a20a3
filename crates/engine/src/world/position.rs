use super::chunk::{DEPTH, HEIGHT, WIDTH};

/// Absolute block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk this block belongs to. Arithmetic shift is floor division,
    /// so `x = -1` lands in chunk `-1`, not `0`.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: (self.x >> 4) as i32,
            z: (self.z >> 4) as i32,
        }
    }

    /// Position within the chunk (0..16 on x/z; y is passed through unchecked).
    pub const fn local(&self) -> LocalBlockPos {
        LocalBlockPos {
            x: (self.x & 0xF) as u8,
            y: self.y as i32,
            z: (self.z & 0xF) as u8,
        }
    }

    pub const fn offset(&self, dx: i64, dy: i64, dz: i64) -> BlockPos {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub const fn below(&self) -> BlockPos {
        self.offset(0, -1, 0)
    }

    pub const fn above(&self) -> BlockPos {
        self.offset(0, 1, 0)
    }

    /// The four horizontal neighbors (±X, ±Z).
    pub const fn horizontal_neighbors(&self) -> [BlockPos; 4] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }

    /// Whether `y` lies inside the world's vertical range.
    pub const fn in_height_range(&self) -> bool {
        self.y >= 0 && self.y < HEIGHT as i64
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn block_origin(&self, y: i64) -> BlockPos {
        BlockPos::new((self.x as i64) << 4, y, (self.z as i64) << 4)
    }

    /// World position of a chunk-local coordinate.
    pub const fn block_at(&self, local: LocalBlockPos) -> BlockPos {
        BlockPos::new(
            ((self.x as i64) << 4) + local.x as i64,
            local.y as i64,
            ((self.z as i64) << 4) + local.z as i64,
        )
    }
}

/// Block position local to a chunk. Only positions with `x < 16`,
/// `0 <= y < 128` and `z < 16` address a slot; `Chunk` rejects the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalBlockPos {
    pub x: u8,
    pub y: i32,
    pub z: u8,
}

impl LocalBlockPos {
    pub const fn new(x: u8, y: i32, z: u8) -> Self {
        Self { x, y, z }
    }

    pub const fn in_bounds(&self) -> bool {
        (self.x as usize) < WIDTH && self.y >= 0 && (self.y as usize) < HEIGHT && (self.z as usize) < DEPTH
    }
}
