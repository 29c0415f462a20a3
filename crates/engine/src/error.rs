//! Error taxonomy shared by every world operation.

use crate::world::position::ChunkPos;

/// Failure of the backing store itself (disk, region file, etc.).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Backend(String),
    /// The backend holds a record for the chunk but cannot decode it.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A chunk-local coordinate outside the chunk's dimensions. Always a
    /// programming error on the caller's side.
    #[error("local position ({x}, {y}, {z}) is outside the chunk")]
    OutOfBounds { x: i32, y: i32, z: i32 },

    /// Stored bytes do not parse under the expected format version.
    #[error("corrupt {record}: {reason}")]
    StorageCorrupt { record: String, reason: String },

    /// A write to the backing store failed.
    #[error("failed to persist {record}: {source}")]
    PersistenceFailure {
        record: String,
        #[source]
        source: StorageError,
    },

    /// A pluggable terrain generator broke its contract.
    #[error("generator `{generator}` violated its contract: {reason}")]
    GenerationFailure { generator: String, reason: String },

    /// A read from the backing store failed (not a parse failure).
    #[error("storage read failed: {0}")]
    Storage(#[from] StorageError),
}

impl WorldError {
    pub(crate) fn corrupt_chunk(pos: ChunkPos, reason: impl Into<String>) -> Self {
        Self::StorageCorrupt {
            record: format!("chunk ({}, {})", pos.x, pos.z),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt_root(reason: impl Into<String>) -> Self {
        Self::StorageCorrupt {
            record: "world root".into(),
            reason: reason.into(),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::StorageCorrupt { .. })
    }
}

pub type WorldResult<T> = Result<T, WorldError>;
