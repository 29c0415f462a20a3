//! Gravity and fluid behaviors on a flat world (surface at y = 3).

use std::sync::Arc;

use blockforge_engine::rules::BlockUpdate;
use blockforge_engine::world::WorldStore;
use blockforge_engine::world::block::{BlockData, BlockId};
use blockforge_engine::world::position::{BlockPos, ChunkPos};
use blockforge_engine::world::storage::MemoryStorage;
use blockforge_server::block::{self, FluidKind};
use blockforge_server::{rules, terrain};

fn flat_world() -> WorldStore {
    let store = WorldStore::load_or_create(
        "rules",
        0,
        terrain::by_name("flat").unwrap(),
        Arc::new(MemoryStorage::new()),
        Arc::new(rules::standard_registry()),
    )
    .unwrap();
    store.get_chunk(ChunkPos::new(0, 0)).unwrap();
    store
}

/// Place a block and run its behavior once, as the settling pass would.
fn place_and_update(world: &WorldStore, pos: BlockPos, data: BlockData) {
    world.set_block(pos, data).unwrap();
    update(world, pos);
}

fn update(world: &WorldStore, pos: BlockPos) {
    let data = world.get_block(pos).unwrap();
    world
        .registry()
        .lookup(data.id)
        .block_update(world, &BlockUpdate::settle(pos, data))
        .unwrap();
}

fn id_at(world: &WorldStore, x: i64, y: i64, z: i64) -> BlockId {
    world.get_block(BlockPos::new(x, y, z)).unwrap().id
}

// ── Gravity ──────────────────────────────────────────────────────────────

#[test]
fn sand_falls_to_the_surface() {
    let world = flat_world();
    place_and_update(&world, BlockPos::new(3, 40, 3), BlockData::of(block::SAND));

    assert_eq!(id_at(&world, 3, 4, 3), block::SAND);
    assert_eq!(id_at(&world, 3, 40, 3), block::AIR);
    let chunk = world.peek_chunk(ChunkPos::new(0, 0)).unwrap();
    assert_eq!(chunk.read().unwrap().height_at(3, 3), Some(4));
}

#[test]
fn gravel_displaces_water_below() {
    let world = flat_world();
    world.set_block(BlockPos::new(5, 4, 5), BlockData::of(block::STILL_WATER)).unwrap();
    world.set_block(BlockPos::new(5, 5, 5), BlockData::of(block::STILL_WATER)).unwrap();
    place_and_update(&world, BlockPos::new(5, 9, 5), BlockData::of(block::GRAVEL));

    assert_eq!(id_at(&world, 5, 4, 5), block::GRAVEL);
    assert_eq!(id_at(&world, 5, 5, 5), block::STILL_WATER);
    assert_eq!(id_at(&world, 5, 9, 5), block::AIR);
}

#[test]
fn supported_sand_stays_put() {
    let world = flat_world();
    place_and_update(&world, BlockPos::new(1, 4, 1), BlockData::of(block::SAND));
    place_and_update(&world, BlockPos::new(1, 5, 1), BlockData::of(block::SAND));

    assert_eq!(id_at(&world, 1, 4, 1), block::SAND);
    assert_eq!(id_at(&world, 1, 5, 1), block::SAND);
}

#[test]
fn sand_never_falls_below_the_world() {
    let world = flat_world();
    for y in 0..4 {
        world.set_block(BlockPos::new(2, y, 2), BlockData::AIR).unwrap();
    }
    place_and_update(&world, BlockPos::new(2, 3, 2), BlockData::of(block::SAND));
    assert_eq!(id_at(&world, 2, 0, 2), block::SAND);
}

// ── Fluids ───────────────────────────────────────────────────────────────

#[test]
fn water_source_spreads_one_step_outward() {
    let world = flat_world();
    place_and_update(&world, BlockPos::new(8, 4, 8), BlockData::of(block::STILL_WATER));

    for (x, z) in [(9, 8), (7, 8), (8, 9), (8, 7)] {
        assert_eq!(
            world.get_block(BlockPos::new(x, 4, z)).unwrap(),
            BlockData::new(block::WATER, 1)
        );
    }
    assert_eq!(id_at(&world, 10, 4, 8), block::AIR);
}

#[test]
fn fluid_above_air_falls_first() {
    let world = flat_world();
    place_and_update(&world, BlockPos::new(8, 10, 8), BlockData::of(block::STILL_WATER));

    assert_eq!(world.get_block(BlockPos::new(8, 9, 8)).unwrap(), BlockData::new(block::WATER, 1));
    assert_eq!(id_at(&world, 9, 10, 8), block::AIR);
}

#[test]
fn lava_stops_at_its_max_spread() {
    let world = flat_world();
    let max = FluidKind::Lava.max_spread();
    place_and_update(&world, BlockPos::new(4, 4, 4), BlockData::new(block::LAVA, max));
    assert_eq!(id_at(&world, 5, 4, 4), block::AIR);

    place_and_update(&world, BlockPos::new(4, 4, 10), BlockData::new(block::LAVA, max - 1));
    assert_eq!(world.get_block(BlockPos::new(5, 4, 10)).unwrap(), BlockData::new(block::LAVA, max));
}

#[test]
fn fluid_at_chunk_border_does_not_generate_neighbours() {
    let world = flat_world();
    place_and_update(&world, BlockPos::new(15, 4, 8), BlockData::of(block::STILL_WATER));

    assert!(world.peek_chunk(ChunkPos::new(1, 0)).is_none());
    assert_eq!(world.loaded_chunks(), 1);
    assert_eq!(world.get_block(BlockPos::new(14, 4, 8)).unwrap(), BlockData::new(block::WATER, 1));
}

#[test]
fn fluid_crosses_into_loaded_neighbours() {
    let world = flat_world();
    world.get_chunk(ChunkPos::new(-1, 0)).unwrap();
    place_and_update(&world, BlockPos::new(0, 4, 8), BlockData::of(block::STILL_WATER));

    assert_eq!(world.get_block(BlockPos::new(-1, 4, 8)).unwrap(), BlockData::new(block::WATER, 1));
}

#[test]
fn non_fluid_update_on_fluid_behavior_is_ignored() {
    let world = flat_world();
    // The block changed since the update was queued.
    let pos = BlockPos::new(6, 4, 6);
    world.set_block(pos, BlockData::of(block::COBBLESTONE)).unwrap();
    world
        .registry()
        .lookup(block::STILL_WATER)
        .block_update(&world, &BlockUpdate::settle(pos, BlockData::of(block::STILL_WATER)))
        .unwrap();
    assert_eq!(id_at(&world, 7, 4, 6), block::AIR);
}
