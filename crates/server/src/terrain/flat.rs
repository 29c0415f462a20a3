//! Flat world chunk generator.
//!
//! - Y = 0: Bedrock
//! - Y = 1-2: Dirt
//! - Y = 3: Grass
//! - Y = 4+: Air

use blockforge_engine::world::block::BlockData;
use blockforge_engine::world::chunk::Chunk;
use blockforge_engine::world::generator::TerrainGenerator;
use blockforge_engine::world::position::ChunkPos;

use super::place;
use crate::block::{self, biome};

pub const NAME: &str = "flat";

pub struct FlatGenerator;

impl TerrainGenerator for FlatGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn generate(&self, _seed: u64, pos: ChunkPos) -> Chunk {
        let mut chunk = Chunk::new(pos);
        let layers = [block::BEDROCK, block::DIRT, block::DIRT, block::GRASS];
        for x in 0..16u8 {
            for z in 0..16u8 {
                for (y, id) in layers.into_iter().enumerate() {
                    place(&mut chunk, x, y as i32, z, BlockData::of(id));
                }
                chunk.set_biome(x, z, biome::PLAINS);
            }
        }
        chunk
    }
}
