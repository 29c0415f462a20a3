//! The per-world root record: identity and the seed that fixes generation.

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, WorldError, WorldResult};

pub const ROOT_FORMAT_VERSION: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldRoot {
    pub name: String,
    pub seed: u64,
    pub generator: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct RootNbt {
    #[serde(rename = "FormatVersion")]
    format_version: i32,
    #[serde(rename = "Name")]
    name: String,
    /// NBT has no unsigned longs; the seed is stored bit-for-bit as i64.
    #[serde(rename = "Seed")]
    seed: i64,
    #[serde(rename = "Generator")]
    generator: String,
}

impl WorldRoot {
    pub fn encode(&self) -> WorldResult<Vec<u8>> {
        let nbt = RootNbt {
            format_version: ROOT_FORMAT_VERSION,
            name: self.name.clone(),
            seed: self.seed as i64,
            generator: self.generator.clone(),
        };
        fastnbt::to_bytes(&nbt).map_err(|e| WorldError::PersistenceFailure {
            record: "world root".into(),
            source: StorageError::Backend(e.to_string()),
        })
    }

    pub fn decode(bytes: &[u8]) -> WorldResult<WorldRoot> {
        let nbt: RootNbt =
            fastnbt::from_bytes(bytes).map_err(|e| WorldError::corrupt_root(e.to_string()))?;
        if nbt.format_version != ROOT_FORMAT_VERSION {
            return Err(WorldError::corrupt_root(format!(
                "unsupported format version {}",
                nbt.format_version
            )));
        }
        Ok(WorldRoot {
            name: nbt.name,
            seed: nbt.seed as u64,
            generator: nbt.generator,
        })
    }
}
