use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// `config.toml`. Every section and field is optional; missing ones take
/// their defaults.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub world: WorldSection,
    pub autosave: AutosaveSection,
    pub logging: LoggingSection,
    pub debug: DebugSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    pub name: String,
    pub directory: PathBuf,
    /// Used only when the world is first created; afterwards the stored seed
    /// wins. Negative values are the upper half of the u64 seed space.
    pub seed: i64,
    pub generator: String,
    /// Chunk radius around (0, 0) generated and settled for a new world.
    pub spawn_radius: i32,
    /// Move an unreadable world aside and create a fresh one instead of
    /// refusing to start.
    pub regenerate_on_load_failure: bool,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            name: "default".into(),
            directory: PathBuf::from("world"),
            seed: 1922464833,
            generator: crate::terrain::standard::NAME.into(),
            spawn_radius: 5,
            regenerate_on_load_failure: true,
        }
    }
}

impl WorldSection {
    pub fn seed(&self) -> u64 {
        self.seed as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveSection {
    pub interval_secs: u64,
    /// How long shutdown waits for the final save.
    pub shutdown_timeout_secs: u64,
}

impl Default for AutosaveSection {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            shutdown_timeout_secs: 10,
        }
    }
}

impl AutosaveSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing` filter directive; `RUST_LOG` overrides it.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSection {
    /// Wipe the world directory before opening it.
    pub delete_world_on_startup: bool,
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load `path`, or write the defaults there and use them if it does not
    /// exist yet.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        let contents = toml::to_string_pretty(&config).context("serializing default config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("writing default config to {}", path.display()))?;
        Ok(config)
    }
}
