//! Block type definitions and property lookups.
//!
//! Ids follow the classic (pre-flattening) numbering, so a block fits in the
//! engine's one-byte `BlockId` and metadata carries per-block state such as
//! fluid level.

use blockforge_engine::world::block::BlockId;

pub const AIR: BlockId = BlockId::AIR;
pub const STONE: BlockId = BlockId(1);
pub const GRASS: BlockId = BlockId(2);
pub const DIRT: BlockId = BlockId(3);
pub const COBBLESTONE: BlockId = BlockId(4);
pub const BEDROCK: BlockId = BlockId(7);
pub const WATER: BlockId = BlockId(8); // flowing
pub const STILL_WATER: BlockId = BlockId(9);
pub const LAVA: BlockId = BlockId(10); // flowing
pub const STILL_LAVA: BlockId = BlockId(11);
pub const SAND: BlockId = BlockId(12);
pub const GRAVEL: BlockId = BlockId(13);

/// Biome bytes written by the bundled generators.
pub mod biome {
    pub const PLAINS: u8 = 1;
    pub const BEACH: u8 = 16;
    pub const OCEAN: u8 = 0;
}

/// Does this block fall under gravity (like sand/gravel)?
pub fn has_gravity(id: BlockId) -> bool {
    id == SAND || id == GRAVEL
}

/// Is this a fluid that spreads?
pub fn is_fluid(id: BlockId) -> bool {
    FluidKind::of(id).is_some()
}

/// Can another block be placed in this space?
pub fn is_replaceable(id: BlockId) -> bool {
    id == AIR || is_fluid(id)
}

/// Is this block fully solid?
pub fn is_solid(id: BlockId) -> bool {
    !is_replaceable(id)
}

/// The two fluid families. Each has a flowing and a still id; the flow level
/// (0 = source, higher = further from it) lives in the block's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidKind {
    Water,
    Lava,
}

impl FluidKind {
    pub fn of(id: BlockId) -> Option<FluidKind> {
        match id {
            WATER | STILL_WATER => Some(FluidKind::Water),
            LAVA | STILL_LAVA => Some(FluidKind::Lava),
            _ => None,
        }
    }

    pub fn is_match(self, id: BlockId) -> bool {
        FluidKind::of(id) == Some(self)
    }

    /// Id placed when this fluid flows into a new space.
    pub fn flowing(self) -> BlockId {
        match self {
            FluidKind::Water => WATER,
            FluidKind::Lava => LAVA,
        }
    }

    /// Furthest level a fluid reaches horizontally from its source.
    pub fn max_spread(self) -> u8 {
        match self {
            FluidKind::Water => 7,
            FluidKind::Lava => 3,
        }
    }
}
