//! Bundled terrain generators, selectable by name from the config.

pub mod flat;
pub mod standard;

use std::sync::Arc;

use blockforge_engine::world::block::BlockData;
use blockforge_engine::world::chunk::Chunk;
use blockforge_engine::world::generator::TerrainGenerator;
use blockforge_engine::world::position::LocalBlockPos;

pub use flat::FlatGenerator;
pub use standard::StandardGenerator;

/// Names accepted by [`by_name`].
pub const GENERATORS: [&str; 2] = [standard::NAME, flat::NAME];

pub fn by_name(name: &str) -> Option<Arc<dyn TerrainGenerator>> {
    match name {
        standard::NAME => Some(Arc::new(StandardGenerator)),
        flat::NAME => Some(Arc::new(FlatGenerator)),
        _ => None,
    }
}

/// Place a block during generation. Callers keep `y` inside the chunk.
fn place(chunk: &mut Chunk, x: u8, y: i32, z: u8, data: BlockData) {
    let placed = chunk.set(LocalBlockPos::new(x, y, z), data);
    debug_assert!(placed.is_ok(), "generator wrote outside the chunk at y = {y}");
}
