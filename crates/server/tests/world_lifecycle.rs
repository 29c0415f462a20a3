//! End-to-end world lifecycle on disk: create, materialize, settle, save,
//! reopen, and the bootstrap recovery paths.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use blockforge_engine::error::WorldError;
use blockforge_engine::settle::SettlingPass;
use blockforge_engine::world::WorldStore;
use blockforge_engine::world::chunk::Chunk;
use blockforge_engine::world::position::{ChunkPos, LocalBlockPos};
use blockforge_engine::world::region::{ChunkRegion, PassOrder};
use blockforge_server::bootstrap;
use blockforge_server::config::{DebugSection, WorldSection};
use blockforge_server::persistence::RegionStorage;
use blockforge_server::{block, rules, terrain};

const SEED: u64 = 1922464833;

fn temp_world(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("blockforge_{}_{}", tag, rand::random::<u64>()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn open_standard(dir: &PathBuf) -> WorldStore {
    WorldStore::load_or_create(
        "default",
        SEED,
        terrain::by_name("standard").unwrap(),
        Arc::new(RegionStorage::open(dir).unwrap()),
        Arc::new(rules::standard_registry()),
    )
    .unwrap()
}

fn world_config(dir: &PathBuf, generator: &str) -> WorldSection {
    WorldSection {
        directory: dir.clone(),
        generator: generator.into(),
        spawn_radius: 1,
        ..WorldSection::default()
    }
}

#[test]
fn spawn_region_survives_restart_block_for_block() {
    let dir = temp_world("lifecycle");
    let region = ChunkRegion::new(ChunkPos::new(-5, -5), ChunkPos::new(5, 5));
    let positions = region.positions(PassOrder::ColumnMajor);

    let before: Vec<Chunk> = {
        let store = open_standard(&dir);
        assert!(store.was_created());
        for pos in &positions {
            store.get_chunk(*pos).unwrap();
        }
        assert_eq!(store.loaded_chunks(), 100);

        let report = SettlingPass::new(PassOrder::ColumnMajor).run(&store, region);
        assert!(
            !report
                .failures
                .iter()
                .any(|(_, e)| matches!(e, WorldError::OutOfBounds { .. }))
        );
        assert!(report.is_clean());
        assert_eq!(report.chunks_settled, 100);
        // Settling never reaches beyond what is loaded.
        assert_eq!(store.loaded_chunks(), 100);

        let saved = store.save();
        assert!(saved.is_complete());
        assert_eq!(saved.saved, 100);

        positions
            .iter()
            .map(|pos| store.peek_chunk(*pos).unwrap().read().unwrap().clone())
            .collect()
    };

    let store = open_standard(&dir);
    assert!(!store.was_created());
    for (pos, expected) in positions.iter().zip(&before) {
        let reloaded = store.get_chunk(*pos).unwrap();
        let reloaded = reloaded.read().unwrap();
        assert_eq!(&*reloaded, expected, "chunk ({}, {}) differs after reload", pos.x, pos.z);
        assert!(reloaded.is_settled());
    }
    assert_eq!(store.stats().generated, 0);
    assert_eq!(store.stats().loaded, 100);

    let _ = fs::remove_dir_all(&dir);
}

/// Overwrite the start of one chunk's zlib stream inside a region file.
fn damage_chunk_payload(region_file: &PathBuf, slot: usize) {
    let mut bytes = fs::read(region_file).unwrap();
    let entry = &bytes[slot * 4..slot * 4 + 4];
    let sector = u32::from_be_bytes([0, entry[0], entry[1], entry[2]]) as usize;
    let payload = sector * 4096 + 5;
    bytes[payload..payload + 64].fill(0xAB);
    fs::write(region_file, bytes).unwrap();
}

#[test]
fn damaged_region_payload_regenerates_only_that_chunk() {
    let dir = temp_world("damaged");
    let open = || {
        WorldStore::load_or_create(
            "default",
            SEED,
            terrain::by_name("flat").unwrap(),
            Arc::new(RegionStorage::open(&dir).unwrap()),
            Arc::new(rules::standard_registry()),
        )
        .unwrap()
    };

    let neighbour = {
        let store = open();
        store.get_chunk(ChunkPos::new(0, 0)).unwrap();
        let chunk = store.get_chunk(ChunkPos::new(1, 0)).unwrap();
        chunk
            .write()
            .unwrap()
            .set(LocalBlockPos::new(3, 10, 3), block::SAND.into())
            .unwrap();
        assert!(store.save().is_complete());
        chunk.read().unwrap().clone()
    };

    damage_chunk_payload(&dir.join("region/r.0.0.mca"), 0);

    let store = open();
    let regenerated = store.get_chunk(ChunkPos::new(0, 0)).unwrap();
    let expected = terrain::by_name("flat").unwrap().generate(SEED, ChunkPos::new(0, 0));
    {
        let regenerated = regenerated.read().unwrap();
        assert!(regenerated.is_dirty());
        assert_eq!(*regenerated, expected);
    }

    let loaded = store.get_chunk(ChunkPos::new(1, 0)).unwrap();
    assert_eq!(*loaded.read().unwrap(), neighbour);

    let stats = store.stats();
    assert_eq!(stats.regenerated, 1);
    assert_eq!(stats.loaded, 1);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn settled_sand_always_rests_on_something_solid() {
    let dir = temp_world("sand");
    let store = open_standard(&dir);
    let region = ChunkRegion::square(ChunkPos::new(0, 0), 2);
    store.materialize_region(region, |_, _| {}).unwrap();
    SettlingPass::default().run(&store, region);

    for pos in region.positions(PassOrder::ColumnMajor) {
        let chunk = store.peek_chunk(pos).unwrap();
        let chunk = chunk.read().unwrap();
        for x in 0..16u8 {
            for z in 0..16u8 {
                let Some(top) = chunk.height_at(x, z) else { continue };
                for y in 1..=top as i32 {
                    let here = chunk.get(LocalBlockPos::new(x, y, z)).unwrap().id;
                    if block::has_gravity(here) {
                        let below = chunk.get(LocalBlockPos::new(x, y - 1, z)).unwrap().id;
                        assert!(block::is_solid(below), "floating {:?} at ({x}, {y}, {z})", here);
                    }
                }
            }
        }
    }
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bootstrap_prepares_spawn_only_for_new_worlds() {
    let dir = temp_world("bootstrap");
    let config = world_config(&dir, "flat");

    let world = bootstrap::open_world(&config, &DebugSection::default()).unwrap();
    assert!(world.was_created());
    assert_eq!(world.loaded_chunks(), 4);
    assert!(world.dirty_chunks().is_empty());
    drop(world);

    let world = bootstrap::open_world(&config, &DebugSection::default()).unwrap();
    assert!(!world.was_created());
    assert_eq!(world.loaded_chunks(), 0);
    assert!(world.is_persisted(ChunkPos::new(-1, -1)));
    assert!(!world.is_persisted(ChunkPos::new(1, 1)));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn delete_on_startup_recreates_world() {
    let dir = temp_world("wipe");
    let config = world_config(&dir, "flat");
    drop(bootstrap::open_world(&config, &DebugSection::default()).unwrap());

    let wipe = DebugSection {
        delete_world_on_startup: true,
    };
    let world = bootstrap::open_world(&config, &wipe).unwrap();
    assert!(world.was_created());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_world_is_moved_aside_when_allowed() {
    let dir = temp_world("damaged");
    let config = world_config(&dir, "flat");
    drop(bootstrap::open_world(&config, &DebugSection::default()).unwrap());
    fs::write(dir.join("level.dat"), b"this is not a gzip stream").unwrap();

    let strict = WorldSection {
        regenerate_on_load_failure: false,
        ..config.clone()
    };
    assert!(bootstrap::open_world(&strict, &DebugSection::default()).is_err());
    assert_eq!(fs::read(dir.join("level.dat")).unwrap(), b"this is not a gzip stream");

    let world = bootstrap::open_world(&config, &DebugSection::default()).unwrap();
    assert!(world.was_created());

    let prefix = format!("{}.corrupt-", dir.file_name().unwrap().to_string_lossy());
    let parent = dir.parent().unwrap();
    let aside: Vec<PathBuf> = fs::read_dir(parent)
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().starts_with(&prefix)))
        .collect();
    assert_eq!(aside.len(), 1);
    assert!(aside[0].join("level.dat").exists());

    let _ = fs::remove_dir_all(&dir);
    let _ = fs::remove_dir_all(&aside[0]);
}

#[test]
fn unknown_generator_fails_fast() {
    let dir = temp_world("nogen");
    let config = world_config(&dir, "amplified");
    let Err(err) = bootstrap::open_world(&config, &DebugSection::default()) else {
        panic!("unknown generator accepted");
    };
    assert!(err.to_string().contains("amplified"));
}
