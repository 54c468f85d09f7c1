pub mod models;

pub use models::*;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct ConfigService {
    path: PathBuf,
    config: Mutex<PipelineConfig>,
}

impl ConfigService {
    /// Load settings from a JSON file. Never fails: a missing file means
    /// defaults, a broken one is logged and also falls back to defaults.
    pub fn load(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            config: Mutex::new(Self::read_file(path)),
        }
    }

    /// Settings without a backing file.
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            path: PathBuf::new(),
            config: Mutex::new(config),
        }
    }

    fn read_file(path: &Path) -> PipelineConfig {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {}, using defaults", path.display());
                return PipelineConfig::default();
            }
            Err(e) => {
                log::error!("Failed to read settings {}: {e}", path.display());
                return PipelineConfig::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to parse settings {}: {e}", path.display());
                PipelineConfig::default()
            }
        }
    }

    /// Re-read the backing file, keeping the current settings if there is none.
    pub fn reload(&self) -> PipelineConfig {
        if self.path.as_os_str().is_empty() {
            return self.get_config();
        }
        let fresh = Self::read_file(&self.path);
        *self
            .config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = fresh.clone();
        fresh
    }

    pub fn get_config(&self) -> PipelineConfig {
        self.config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
