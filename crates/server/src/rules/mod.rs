pub mod block_updates;
pub mod helpers;

use std::sync::Arc;

use blockforge_engine::rules::BlockRegistry;

use crate::block::{self, FluidKind};
use block_updates::{FluidFlow, Gravity};

/// The standard behavior set: gravity for sand and gravel, spread for water
/// and lava.
pub fn standard_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();

    let gravity = Arc::new(Gravity);
    registry.register(block::SAND, gravity.clone());
    registry.register(block::GRAVEL, gravity);

    let water = Arc::new(FluidFlow::new(FluidKind::Water));
    registry.register(block::WATER, water.clone());
    registry.register(block::STILL_WATER, water);

    let lava = Arc::new(FluidFlow::new(FluidKind::Lava));
    registry.register(block::LAVA, lava.clone());
    registry.register(block::STILL_LAVA, lava);

    registry
}
