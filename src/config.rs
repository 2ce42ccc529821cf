//! Configuration for the delta history engine.

use crate::core::{EngineConfig, EngineConfigError, FeatureRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration: engine parameters and the feature layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of frames kept in the ring
    pub capacity: usize,

    /// Nominal sampling rate in frames per second
    pub frame_rate: f64,

    /// Window length used when a query omits one
    pub default_window_ms: i64,

    /// Feature columns and groups, in declaration order
    pub features: Vec<FeatureConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            capacity: engine.capacity,
            frame_rate: engine.frame_rate,
            default_window_ms: engine.default_window_ms,
            features: Vec::new(),
        }
    }
}

/// One declared name. Without `members` it is a feature column; with
/// `members` it is a group over earlier names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

impl FeatureConfig {
    pub fn feature(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: None,
        }
    }

    pub fn group<S: Into<String>>(name: impl Into<String>, members: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            members: Some(members.into_iter().map(Into::into).collect()),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("delta-history")
            .join("config.json")
    }

    /// Engine parameters, validated.
    pub fn engine(&self) -> Result<EngineConfig, ConfigError> {
        let engine = EngineConfig {
            capacity: self.capacity,
            frame_rate: self.frame_rate,
            default_window_ms: self.default_window_ms,
        };
        engine.validate()?;
        Ok(engine)
    }

    /// Build the feature registry.
    ///
    /// With no declared features, `width` unnamed columns `f0..f{width-1}`
    /// are registered instead.
    pub fn registry(&self, width: usize) -> Result<FeatureRegistry, ConfigError> {
        if self.features.is_empty() {
            return Ok(FeatureRegistry::from_names((0..width).map(|i| format!("f{i}")))?);
        }

        let builder = self
            .features
            .iter()
            .fold(FeatureRegistry::builder(), |builder, entry| match &entry.members {
                Some(members) => builder.group(entry.name.clone(), members),
                None => builder.feature(entry.name.clone()),
            });
        Ok(builder.build()?)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
    #[error("Invalid engine settings: {0}")]
    Engine(#[from] EngineConfigError),
    #[error("Invalid feature layout: {0}")]
    Registry(#[from] RegistryError),
}
