//! Default terrain: rolling hills and seas with beaches and caves.
//!
//! Heights come from a few octaves of 2-D Perlin noise sampled at world
//! coordinates, so neighbouring chunks line up without knowing about each
//! other. Every value is a pure function of `(seed, position)`.

use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use blockforge_engine::world::block::{BlockData, BlockId};
use blockforge_engine::world::chunk::{Chunk, DEPTH, HEIGHT, WIDTH};
use blockforge_engine::world::generator::TerrainGenerator;
use blockforge_engine::world::position::ChunkPos;

use super::place;
use crate::block::{self, biome};

pub const NAME: &str = "standard";

pub const SEA_LEVEL: i32 = 64;

/// Columns whose surface is within this distance of sea level get sand.
const BEACH_BAND: i32 = 2;
/// Sea floor this far below sea level is gravel.
const DEEP_WATER: i32 = 6;
/// Bedrock is solid at y = 0 and ragged up to this height.
const BEDROCK_CEILING: i32 = 4;
/// Caves cut from this height up to `surface - CAVE_ROOF`, which is the
/// block right under the surface layers.
const CAVE_FLOOR: i32 = 6;
const CAVE_ROOF: i32 = 4;
const CAVE_THRESHOLD: f64 = 0.42;

const HEIGHT_OCTAVES: u32 = 4;
const HEIGHT_SCALE: f64 = 1.0 / 160.0;
const HEIGHT_AMPLITUDE: f64 = 22.0;

pub struct StandardGenerator;

/// Noise fields for one seed.
struct Fields {
    height: Vec<Perlin>,
    caves: Perlin,
}

impl Fields {
    fn new(seed: u64) -> Self {
        let base = fold_seed(seed);
        Self {
            height: (0..HEIGHT_OCTAVES)
                .map(|octave| Perlin::new(base.wrapping_add(octave)))
                .collect(),
            caves: Perlin::new(base.wrapping_add(0x0CA7_E5ED)),
        }
    }

    /// Surface height of the column at world `(x, z)`.
    fn surface(&self, x: f64, z: f64) -> i32 {
        let (mut sum, mut norm, mut amplitude, mut frequency) = (0.0, 0.0, 1.0, HEIGHT_SCALE);
        for perlin in &self.height {
            sum += perlin.get([x * frequency, z * frequency]) * amplitude;
            norm += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        let height = SEA_LEVEL as f64 + (sum / norm) * HEIGHT_AMPLITUDE * 2.0;
        (height.round() as i32).clamp(BEDROCK_CEILING + 2, HEIGHT as i32 - 8)
    }

    fn is_cave(&self, x: f64, y: f64, z: f64) -> bool {
        self.caves.get([x / 24.0, y / 12.0, z / 24.0]) > CAVE_THRESHOLD
    }
}

/// `noise` seeds are 32-bit; keep the high half of the world seed in play.
fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

fn chunk_rng(seed: u64, pos: ChunkPos) -> StdRng {
    let mix = (pos.x as i64 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (pos.z as i64 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    StdRng::seed_from_u64(seed ^ mix)
}

/// Surface layers for a column, top first.
fn surface_layers(height: i32) -> ([BlockId; 4], u8) {
    if height < SEA_LEVEL - DEEP_WATER {
        ([block::GRAVEL, block::GRAVEL, block::DIRT, block::DIRT], biome::OCEAN)
    } else if height <= SEA_LEVEL + BEACH_BAND {
        ([block::SAND; 4], biome::BEACH)
    } else {
        ([block::GRASS, block::DIRT, block::DIRT, block::DIRT], biome::PLAINS)
    }
}

impl TerrainGenerator for StandardGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn generate(&self, seed: u64, pos: ChunkPos) -> Chunk {
        let fields = Fields::new(seed);
        let mut rng = chunk_rng(seed, pos);
        let mut chunk = Chunk::new(pos);
        let origin = pos.block_origin(0);

        for x in 0..WIDTH as u8 {
            for z in 0..DEPTH as u8 {
                let wx = (origin.x + x as i64) as f64;
                let wz = (origin.z + z as i64) as f64;
                let height = fields.surface(wx, wz);
                let (layers, column_biome) = surface_layers(height);

                place(&mut chunk, x, 0, z, BlockData::of(block::BEDROCK));
                for y in 1..=height {
                    let depth = (height - y) as usize;
                    let id = if y <= BEDROCK_CEILING && rng.gen_range(0..=BEDROCK_CEILING) >= y {
                        block::BEDROCK
                    } else if depth < layers.len() {
                        layers[depth]
                    } else {
                        block::STONE
                    };
                    place(&mut chunk, x, y, z, BlockData::of(id));
                }

                for y in CAVE_FLOOR..=height - CAVE_ROOF {
                    if fields.is_cave(wx, y as f64, wz) {
                        place(&mut chunk, x, y, z, BlockData::AIR);
                    }
                }

                for y in height + 1..=SEA_LEVEL {
                    place(&mut chunk, x, y, z, BlockData::of(block::STILL_WATER));
                }

                chunk.set_biome(x, z, column_biome);
            }
        }
        chunk
    }
}
