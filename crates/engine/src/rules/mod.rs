use std::sync::Arc;

use crate::error::WorldResult;
use crate::world::WorldStore;
use crate::world::block::{BlockData, BlockId};
use crate::world::position::BlockPos;

/// A block at `pos` should re-evaluate itself.
///
/// `old` and `new` are the block's state before and after whatever triggered
/// the update. A self-triggered update (settling) passes the current state as
/// both: "nothing about you changed externally, find your resting state now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockUpdate {
    pub pos: BlockPos,
    pub old: BlockData,
    pub new: BlockData,
}

impl BlockUpdate {
    pub const fn settle(pos: BlockPos, data: BlockData) -> Self {
        Self {
            pos,
            old: data,
            new: data,
        }
    }

    pub fn is_self_triggered(&self) -> bool {
        self.old == self.new
    }
}

/// Per-block-type update logic. Stateless: everything it needs arrives in the
/// [`BlockUpdate`] or is read from the world.
///
/// Behaviors mutate the world only through [`WorldStore`]'s block accessors,
/// so they inherit its per-chunk locking. They must not hold a chunk guard
/// across calls back into the store.
pub trait BlockBehavior: Send + Sync {
    fn name(&self) -> &'static str;

    fn block_update(&self, world: &WorldStore, update: &BlockUpdate) -> WorldResult<()>;
}

/// Behavior for ids nobody registered: does nothing.
struct Inert;

impl BlockBehavior for Inert {
    fn name(&self) -> &'static str {
        "inert"
    }

    fn block_update(&self, _world: &WorldStore, _update: &BlockUpdate) -> WorldResult<()> {
        Ok(())
    }
}

/// Process-wide table from block id to behavior. Built once at startup, then
/// shared read-only (`Arc<BlockRegistry>`) by every world.
pub struct BlockRegistry {
    behaviors: Vec<Option<Arc<dyn BlockBehavior>>>,
    inert: Inert,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            behaviors: vec![None; u8::MAX as usize + 1],
            inert: Inert,
        }
    }

    /// Register (or replace) the behavior for `id`.
    pub fn register(&mut self, id: BlockId, behavior: Arc<dyn BlockBehavior>) {
        self.behaviors[id.0 as usize] = Some(behavior);
    }

    /// The behavior for `id`; unregistered ids get an inert behavior.
    pub fn lookup(&self, id: BlockId) -> &dyn BlockBehavior {
        match &self.behaviors[id.0 as usize] {
            Some(behavior) => behavior.as_ref(),
            None => &self.inert,
        }
    }

    pub fn is_registered(&self, id: BlockId) -> bool {
        self.behaviors[id.0 as usize].is_some()
    }

    /// Number of ids with a registered behavior.
    pub fn len(&self) -> usize {
        self.behaviors.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
