//! Block behaviors: gravity and fluid spread.
//!
//! Each behavior re-reads the block at the update position before acting,
//! since an earlier update in the same pass may already have moved it.

use super::helpers::{fluid_level, is_loaded_air, resting_place};
use crate::block::{self, FluidKind};
use blockforge_engine::error::WorldResult;
use blockforge_engine::rules::{BlockBehavior, BlockUpdate};
use blockforge_engine::world::WorldStore;
use blockforge_engine::world::block::BlockData;

// ── Gravity ──────────────────────────────────────────────────────────────

/// Gravity behavior: a gravity-affected block (sand, gravel) with replaceable
/// blocks below falls straight down to the first non-replaceable block.
/// Air or fluid in its path is displaced.
pub struct Gravity;

impl BlockBehavior for Gravity {
    fn name(&self) -> &'static str {
        "gravity"
    }

    fn block_update(&self, world: &WorldStore, update: &BlockUpdate) -> WorldResult<()> {
        let pos = update.pos;
        let current = world.get_block(pos)?;
        if !block::has_gravity(current.id) {
            return Ok(());
        }

        let rest = resting_place(world, pos)?;
        if rest == pos {
            return Ok(());
        }
        world.set_block(rest, current)?;
        world.set_block(pos, BlockData::AIR)?;
        Ok(())
    }
}

// ── Fluids ───────────────────────────────────────────────────────────────

/// Fluid spread, parameterized by `FluidKind`.
///
///   - Falls first: a fluid above air fills it as flowing level 1.
///   - Otherwise spreads horizontally into air, level + 1 per step, up to
///     `kind.max_spread()`.
///
/// Horizontal spread only enters chunks that are already in memory, so a
/// fluid at a chunk border never causes terrain generation.
pub struct FluidFlow {
    kind: FluidKind,
}

impl FluidFlow {
    pub fn new(kind: FluidKind) -> Self {
        Self { kind }
    }
}

impl BlockBehavior for FluidFlow {
    fn name(&self) -> &'static str {
        match self.kind {
            FluidKind::Water => "water",
            FluidKind::Lava => "lava",
        }
    }

    fn block_update(&self, world: &WorldStore, update: &BlockUpdate) -> WorldResult<()> {
        let pos = update.pos;
        let Some(level) = fluid_level(world.get_block(pos)?, self.kind) else {
            return Ok(());
        };

        // Same column, so the chunk is loaded.
        let below = pos.below();
        if below.y >= 0 && world.get_block(below)?.is_air() {
            world.set_block(below, BlockData::new(self.kind.flowing(), 1))?;
            return Ok(());
        }

        if level >= self.kind.max_spread() {
            return Ok(());
        }
        let next = BlockData::new(self.kind.flowing(), level + 1);
        for neighbor in pos.horizontal_neighbors() {
            if is_loaded_air(world, neighbor) {
                world.set_block_if_loaded(neighbor, next)?;
            }
        }
        Ok(())
    }
}
