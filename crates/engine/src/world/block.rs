/// Opaque block type identifier. The engine stores these without interpreting
/// them; game-specific layers assign meaning to specific IDs (e.g. 12 = sand).
///
/// The only semantic the engine enforces is that `BlockId::AIR` (0) is the
/// "empty" block: it never counts toward a column's height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BlockId(pub u8);

impl BlockId {
    /// The universal "empty" block.
    pub const AIR: BlockId = BlockId(0);

    pub const fn new(id: u8) -> Self {
        Self(id)
    }
}

/// The value stored at every block position of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockData {
    pub id: BlockId,
    /// Per-block state byte (fluid level, orientation, ...). Opaque to the engine.
    pub metadata: u8,
}

impl BlockData {
    pub const AIR: BlockData = BlockData {
        id: BlockId::AIR,
        metadata: 0,
    };

    pub const fn new(id: BlockId, metadata: u8) -> Self {
        Self { id, metadata }
    }

    pub const fn of(id: BlockId) -> Self {
        Self { id, metadata: 0 }
    }

    #[inline]
    pub const fn is_air(&self) -> bool {
        self.id.0 == BlockId::AIR.0
    }
}

impl From<BlockId> for BlockData {
    fn from(id: BlockId) -> Self {
        Self::of(id)
    }
}
