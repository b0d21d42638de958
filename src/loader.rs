//! Harness file loader.
//!
//! Loads and parses harness files from disk.

use crate::schema::{HarnessConfig, SCHEMA_VERSION};
use std::path::Path;
use thiserror::Error;

/// Error type for harness file loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported file format: {0} (expected .yaml, .yml, or .toml)")]
    UnsupportedFormat(String),

    #[error("unsupported harness file version {0} (expected 1)")]
    UnsupportedVersion(u32),
}

/// Default harness file name used by `init`.
pub const DEFAULT_CONFIG_FILENAME: &str = "wellbehaved.yaml";

/// Load a harness file, picking the format from its extension.
pub fn load_config(path: &Path) -> Result<HarnessConfig, LoadError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config: HarnessConfig = match ext {
        "yaml" | "yml" => serde_yaml::from_str(&std::fs::read_to_string(path)?)?,
        "toml" => toml::from_str(&std::fs::read_to_string(path)?)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    if config.version != SCHEMA_VERSION {
        return Err(LoadError::UnsupportedVersion(config.version));
    }
    Ok(config)
}
