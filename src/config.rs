// Application settings
// Optional config.json in the app data directory; every field has a default
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::capture::VideoConstraints;
use crate::images::PipelineConfig;
use crate::state::storage::config_path;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Name of the local store (the SQLite file name)
    pub store_name: String,
    /// Time each picture stays on screen during rotation
    pub rotation_interval_ms: u64,
    pub pipeline: PipelineConfig,
    /// Defaults for the camera stream; facing is decided per device at start
    pub camera: VideoConstraints,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_name: "grow".to_string(),
            rotation_interval_ms: 1000,
            pipeline: PipelineConfig::default(),
            camera: VideoConstraints::default(),
        }
    }
}

impl AppConfig {
    /// Load `config.json` from `dir`, falling back to defaults when absent
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = config_path(dir);
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_millis(self.rotation_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store_name.is_empty()
            || !self
                .store_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "store_name '{}' must be non-empty and use only letters, digits, '-' or '_'",
                self.store_name
            )));
        }
        if self.rotation_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "rotation_interval_ms must be positive".to_string(),
            ));
        }
        if self.pipeline.resize_width == Some(0) {
            return Err(ConfigError::Invalid(
                "pipeline.resize_width must be positive".to_string(),
            ));
        }
        if !(self.camera.aspect_ratio > 0.0) {
            return Err(ConfigError::Invalid(
                "camera.aspectRatio must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
