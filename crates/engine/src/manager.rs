//! The set of open worlds in one server process.

use std::sync::{Arc, RwLock};

use crate::world::{SaveReport, WorldStore};

/// Thread-safe registry of open worlds, kept in the order they were added.
///
/// Uses `std::sync::RwLock` because every operation is brief and the access
/// pattern is read-heavy. The lock is released before any world is saved.
#[derive(Default)]
pub struct WorldManager {
    worlds: RwLock<Vec<Arc<WorldStore>>>,
}

impl WorldManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a world. Returns `false` (and keeps the existing one) if a
    /// world with the same name is already open.
    pub fn add_world(&self, world: Arc<WorldStore>) -> bool {
        let mut worlds = self.worlds.write().expect("world manager poisoned");
        if worlds.iter().any(|w| w.name() == world.name()) {
            tracing::warn!("World '{}' is already open; ignoring duplicate", world.name());
            return false;
        }
        tracing::info!("World '{}' added", world.name());
        worlds.push(world);
        true
    }

    /// Snapshot of the open worlds, in insertion order.
    pub fn worlds(&self) -> Vec<Arc<WorldStore>> {
        self.worlds.read().expect("world manager poisoned").clone()
    }

    pub fn world(&self, name: &str) -> Option<Arc<WorldStore>> {
        self.worlds
            .read()
            .expect("world manager poisoned")
            .iter()
            .find(|w| w.name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.worlds.read().expect("world manager poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Save every open world, one after another. A failing world does not
    /// stop the others; its report lists the chunks that stayed dirty.
    pub fn save_all(&self) -> Vec<(String, SaveReport)> {
        self.worlds()
            .into_iter()
            .map(|world| (world.name().to_string(), world.save()))
            .collect()
    }
}
