//! Configuration types for the xlmeta tooling
//!
//! The file format is TOML. Every field has a default, so a missing file or
//! a partial one is always usable:
//!
//! ```toml
//! [output]
//! ndjson = false
//! include_inline = true
//!
//! [export]
//! dir = "./inline-export"
//! overwrite = false
//!
//! [limits]
//! max_record_size = 16777216
//!
//! [logging]
//! level = "warn"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::configuration(e.to_string()))
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| Error::configuration(format!("{}: {e}", path.display())))
    }
}

/// How decoded records are printed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// One compact JSON document per line instead of pretty output
    #[serde(default)]
    pub ndjson: bool,
    /// Include inline data sizes in inspected documents
    #[serde(default = "default_include_inline")]
    pub include_inline: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ndjson: false,
            include_inline: default_include_inline(),
        }
    }
}

/// Where inline object bodies are written by `export`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
    /// Replace files that already exist in the export directory
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
            overwrite: false,
        }
    }
}

/// Input limits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest metadata record read from disk, in bytes
    #[serde(default = "default_max_record_size")]
    pub max_record_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_record_size: default_max_record_size(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_include_inline() -> bool {
    true
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./inline-export")
}

const fn default_max_record_size() -> u64 {
    16 * 1024 * 1024 // 16 MB
}

fn default_log_level() -> String {
    "warn".to_string()
}
