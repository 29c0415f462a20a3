//! Chunked voxel world storage: lazy deterministic generation, a one-shot
//! settling pass, and revision-tracked persistence behind a storage seam.

pub mod error;
pub mod manager;
pub mod rules;
pub mod settle;
pub mod world;

pub use error::{StorageError, WorldError, WorldResult};
pub use manager::WorldManager;
pub use settle::{SettleReport, SettlingPass};
pub use world::{SaveReport, SharedChunk, StoreStats, WorldStore};
