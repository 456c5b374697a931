//! Configuration for Fusion.
//!
//! Read from `$FUSION_CONFIG` when set, otherwise `~/.fusion/config.toml`.
//! A missing file is not an error: every setting has a default.
//!
//! ```toml
//! [bridge]
//! continue_on_captured_context = true
//!
//! [logging]
//! filter = "fusion_core=debug"
//! ```
//!
//! Values here are defaults handed to callers. The adapters never read them
//! implicitly; affinity is still chosen per conversion call.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

use fusion_types::{ContinuationAffinity, ConversionOptions};

pub const CONFIG_ENV_VAR: &str = "FUSION_CONFIG";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FusionConfig {
    pub bridge: Option<BridgeConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// `true` resumes continuations on the scheduler that started the run.
    #[serde(default)]
    pub continue_on_captured_context: ContinuationAffinity,
}

impl From<&BridgeConfig> for ConversionOptions {
    fn from(config: &BridgeConfig) -> Self {
        ConversionOptions {
            affinity: config.continue_on_captured_context,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string.
    pub filter: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl FusionConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::parse(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Ok(config)
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Conversion options built from the `[bridge]` table.
    #[must_use]
    pub fn conversion_options(&self) -> ConversionOptions {
        self.bridge
            .as_ref()
            .map(ConversionOptions::from)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|logging| logging.filter.as_deref())
            .map(str::trim)
            .filter(|filter| !filter.is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_path_from(env::var_os(CONFIG_ENV_VAR), dirs::home_dir())
}

fn config_path_from(env_value: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    match env_value {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => home.map(|home| home.join(".fusion").join("config.toml")),
    }
}
