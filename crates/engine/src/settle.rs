//! The settling pass: one self-triggered update per occupied block so that
//! raw generator output reaches a resting state before anyone observes it.

use std::time::Instant;

use crate::error::WorldError;
use crate::rules::BlockUpdate;
use crate::world::chunk::{DEPTH, WIDTH};
use crate::world::position::{BlockPos, LocalBlockPos};
use crate::world::region::{ChunkRegion, PassOrder};
use crate::world::{SharedChunk, WorldStore};

/// Outcome of one [`SettlingPass::run`].
#[derive(Debug, Default)]
pub struct SettleReport {
    pub chunks_settled: usize,
    /// Chunks that were already settled (loaded from storage, or settled
    /// by an earlier pass).
    pub chunks_skipped: usize,
    pub blocks_updated: usize,
    /// Hook and materialization errors. None of them abort the pass.
    pub failures: Vec<(BlockPos, WorldError)>,
}

impl SettleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Walks a region chunk by chunk and, within each chunk, column by column
/// in `order` with ascending `y`, so a lower block settles before anything
/// resting on it is evaluated.
///
/// Each chunk is settled at most once: afterwards it is flagged and later
/// passes skip it, as do chunks deserialized from storage. Call
/// [`force`](Self::force) to revisit them anyway.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlingPass {
    order: PassOrder,
    force: bool,
}

impl SettlingPass {
    pub fn new(order: PassOrder) -> Self {
        Self { order, force: false }
    }

    /// Also settle chunks that are already flagged settled.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn run(&self, world: &WorldStore, region: ChunkRegion) -> SettleReport {
        let start = Instant::now();
        let mut report = SettleReport::default();

        for pos in region.positions(self.order) {
            let chunk = match world.get_chunk(pos) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!("Settling skipped chunk ({}, {}): {}", pos.x, pos.z, e);
                    report.failures.push((pos.block_origin(0), e));
                    continue;
                }
            };

            if !self.force && chunk.read().expect("chunk lock poisoned").is_settled() {
                report.chunks_skipped += 1;
                continue;
            }

            self.settle_chunk(world, &chunk, &mut report);
            chunk.write().expect("chunk lock poisoned").mark_settled();
            report.chunks_settled += 1;
        }

        tracing::info!(
            "World '{}' settled: {} chunks ({} skipped), {} block updates, {} failures ({:.2?})",
            world.name(),
            report.chunks_settled,
            report.chunks_skipped,
            report.blocks_updated,
            report.failures.len(),
            start.elapsed()
        );
        report
    }

    fn settle_chunk(&self, world: &WorldStore, chunk: &SharedChunk, report: &mut SettleReport) {
        let pos = chunk.read().expect("chunk lock poisoned").pos();

        self.order.for_each_xz(WIDTH as i32, DEPTH as i32, |x, z| {
            let (x, z) = (x as u8, z as u8);
            let mut y = 0;
            loop {
                // The column's height is re-read every step: a hook may have
                // moved blocks into or out of this column.
                let local = LocalBlockPos::new(x, y, z);
                let data = {
                    let guard = chunk.read().expect("chunk lock poisoned");
                    match guard.height_at(x, z) {
                        Some(top) if y <= top as i32 => guard.get(local),
                        _ => break,
                    }
                };
                y += 1;

                let block_pos = pos.block_at(local);
                let data = match data {
                    Ok(data) if data.is_air() => continue,
                    Ok(data) => data,
                    Err(e) => {
                        report.failures.push((block_pos, e));
                        continue;
                    }
                };

                // No chunk lock is held here; hooks go through the store.
                let behavior = world.registry().lookup(data.id);
                match behavior.block_update(world, &BlockUpdate::settle(block_pos, data)) {
                    Ok(()) => report.blocks_updated += 1,
                    Err(e) => {
                        tracing::warn!(
                            "{} update at ({}, {}, {}) failed: {}",
                            behavior.name(),
                            block_pos.x,
                            block_pos.y,
                            block_pos.z,
                            e
                        );
                        report.failures.push((block_pos, e));
                    }
                }
            }
        });
    }
}
