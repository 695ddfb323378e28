//! Configuration loading and parsing

use anyhow::{Context, Result};
use callback_bridge::{DispatchConfig, SlotKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub payloads: Vec<PayloadConfig>,
}

/// Host library whose exported functions become the registered callbacks
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    pub path: Option<PathBuf>,
    #[serde(default = "default_result_symbol")]
    pub result_symbol: String,
    #[serde(default = "default_file_result_symbol")]
    pub file_result_symbol: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: None,
            result_symbol: default_result_symbol(),
            file_result_symbol: default_file_result_symbol(),
        }
    }
}

fn default_result_symbol() -> String {
    "on_result".to_string()
}

fn default_file_result_symbol() -> String {
    "on_file_result".to_string()
}

/// A payload to deliver once callbacks are registered
///
/// Exactly one of `text` or `file` supplies the bytes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PayloadConfig {
    pub slot: SlotKind,
    pub text: Option<String>,
    pub file: Option<PathBuf>,
}

impl PayloadConfig {
    /// Read the payload bytes
    pub fn load_bytes(&self) -> Result<Vec<u8>> {
        match (&self.text, &self.file) {
            (Some(text), None) => Ok(text.as_bytes().to_vec()),
            (None, Some(path)) => fs::read(path)
                .with_context(|| format!("Failed to read payload file: {:?}", path)),
            _ => anyhow::bail!(
                "{} payload must set exactly one of `text` or `file`",
                self.slot
            ),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
