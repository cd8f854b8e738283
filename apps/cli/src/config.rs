//! CLI configuration file support.
//!
//! Configuration precedence:
//! 1. CLI arguments (handled by clap)
//! 2. Environment variables (`PLATE_OCR_PYTHON`)
//! 3. Explicit `--config` file, or the local config file (./.plate-ocr.toml)
//! 4. Global config file (~/.plate-ocr/config.toml)
//! 5. Defaults

use plate_ocr_training::service::ultralytics::DEFAULT_PYTHON;
use plate_ocr_training::{TrainingConfig, DEFAULT_BASE_MODEL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PYTHON_ENV: &str = "PLATE_OCR_PYTHON";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateOcrConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    pub service: ServiceConfig,
    /// Overrides for any training parameter.
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Python interpreter with the `ultralytics` package installed.
    pub python: Option<String>,
    /// Pretrained weights training starts from.
    pub base_model: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl PlateOcrConfig {
    pub fn default_global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".plate-ocr").join("config.toml"))
    }

    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".plate-ocr.toml")
    }

    /// Load the explicit file if given, otherwise the global and local files.
    ///
    /// Missing discovered files are skipped; an explicit file must exist.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let mut table = toml::Table::new();

        match explicit {
            Some(path) => merge_tables(&mut table, read_table(path)?),
            None => {
                let discovered = Self::default_global_path().into_iter().chain([Self::default_local_path()]);
                for path in discovered {
                    match read_table(&path) {
                        Ok(layer) => merge_tables(&mut table, layer),
                        Err(ConfigError::NotFound(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Self::from_table(table)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let table = content.parse::<toml::Table>().map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::from_table(table)
    }

    fn from_table(table: toml::Table) -> ConfigResult<Self> {
        toml::Value::Table(table).try_into().map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))
    }

    /// Interpreter for the model service: env, then file, then `python3`.
    pub fn python(&self) -> String {
        std::env::var(PYTHON_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.service.python.clone())
            .unwrap_or_else(|| DEFAULT_PYTHON.to_string())
    }

    pub fn base_model(&self) -> PathBuf {
        self.service.base_model.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_MODEL))
    }
}

fn read_table(path: &Path) -> ConfigResult<toml::Table> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

    content
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Values from `overlay` override values in `base`; nested tables merge key by key.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => merge_tables(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
