//! Small world queries shared by the block behaviors.

use blockforge_engine::error::WorldResult;
use blockforge_engine::world::WorldStore;
use blockforge_engine::world::block::BlockData;
use blockforge_engine::world::position::BlockPos;

use crate::block::{self, FluidKind};

/// Where a falling block starting at `pos` comes to rest: the lowest spot
/// reachable straight down through replaceable blocks, never below y = 0.
pub fn resting_place(world: &WorldStore, pos: BlockPos) -> WorldResult<BlockPos> {
    let mut rest = pos;
    while rest.y > 0 && block::is_replaceable(world.get_block(rest.below())?.id) {
        rest = rest.below();
    }
    Ok(rest)
}

/// Flow level of `data` if it is a fluid of `kind`. Still fluid is a source.
pub fn fluid_level(data: BlockData, kind: FluidKind) -> Option<u8> {
    if !kind.is_match(data.id) {
        return None;
    }
    if data.id == kind.flowing() {
        Some(data.metadata)
    } else {
        Some(0)
    }
}

/// Whether `pos` is air in a chunk that is already in memory.
pub fn is_loaded_air(world: &WorldStore, pos: BlockPos) -> bool {
    world.peek_block(pos).is_some_and(|data| data.is_air())
}
