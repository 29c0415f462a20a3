use super::position::ChunkPos;

/// Iteration order over a rectangle of chunks (and of columns within each
/// chunk). Y always ascends within a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassOrder {
    /// x is the outer loop, z the inner loop.
    #[default]
    ColumnMajor,
    /// z is the outer loop, x the inner loop.
    RowMajor,
}

impl PassOrder {
    /// Visit every `(a, b)` in `[0, w) x [0, d)` as `(x, z)` in this order.
    pub fn for_each_xz(self, width: i32, depth: i32, mut f: impl FnMut(i32, i32)) {
        match self {
            PassOrder::ColumnMajor => {
                for x in 0..width {
                    for z in 0..depth {
                        f(x, z);
                    }
                }
            }
            PassOrder::RowMajor => {
                for z in 0..depth {
                    for x in 0..width {
                        f(x, z);
                    }
                }
            }
        }
    }
}

/// A rectangle of chunk positions: `min` inclusive, `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRegion {
    pub min: ChunkPos,
    pub max: ChunkPos,
}

impl ChunkRegion {
    pub const fn new(min: ChunkPos, max: ChunkPos) -> Self {
        Self { min, max }
    }

    /// `[center - radius, center + radius)` on both axes, e.g. radius 5
    /// around the origin covers x, z in -5..5 (100 chunks).
    pub const fn square(center: ChunkPos, radius: i32) -> Self {
        Self {
            min: ChunkPos::new(center.x - radius, center.z - radius),
            max: ChunkPos::new(center.x + radius, center.z + radius),
        }
    }

    pub fn width(&self) -> i32 {
        (self.max.x - self.min.x).max(0)
    }

    pub fn depth(&self) -> i32 {
        (self.max.z - self.min.z).max(0)
    }

    pub fn len(&self) -> usize {
        self.width() as usize * self.depth() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        pos.x >= self.min.x && pos.x < self.max.x && pos.z >= self.min.z && pos.z < self.max.z
    }

    /// All positions, in `order`.
    pub fn positions(&self, order: PassOrder) -> Vec<ChunkPos> {
        let mut out = Vec::with_capacity(self.len());
        order.for_each_xz(self.width(), self.depth(), |dx, dz| {
            out.push(ChunkPos::new(self.min.x + dx, self.min.z + dz));
        });
        out
    }
}
