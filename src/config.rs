//! Application configuration.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the data directory next to the database; every key is optional and
//! overrides the stock default of the same name.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! database = "feed.db"         # SQLite file, relative to the data directory
//! blobs_dir = "blobs"          # Image payload directory, relative to the data directory
//!
//! [import]
//! max_selection = 1            # Photos accepted per selection
//! failure_policy = "fail-fast" # "fail-fast" or "skip-failed"
//!
//! [feed]
//! columns = 2                  # Grid columns when rendering the feed
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::import::{FailurePolicy, Importer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file inside the data directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Where posts and image payloads are kept.
    pub storage: StorageConfig,
    /// Media import behaviour.
    pub import: ImportConfig,
    /// Feed rendering.
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.import.max_selection == 0 {
            return Err(ConfigError::Validation(
                "import.max_selection must be at least 1".into(),
            ));
        }
        if self.feed.columns == 0 {
            return Err(ConfigError::Validation(
                "feed.columns must be at least 1".into(),
            ));
        }
        if self.storage.database.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.database must not be empty".into(),
            ));
        }
        if self.storage.blobs_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.blobs_dir must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Storage locations, relative to the data directory unless absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database: String,
    /// Directory of content-addressed image payloads.
    pub blobs_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: "feed.db".to_string(),
            blobs_dir: "blobs".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database)
    }

    pub fn blobs_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.blobs_dir)
    }
}

/// Media import settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Maximum photos accepted from one selection; extras are ignored.
    pub max_selection: usize,
    /// What a failed item does to the rest of the import.
    pub failure_policy: FailurePolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_selection: 1,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl ImportConfig {
    pub fn importer(&self) -> Importer {
        Importer::new(self.failure_policy, self.max_selection)
    }
}

/// Feed rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Number of grid columns.
    pub columns: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { columns: 2 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from the data directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(data_dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = data_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for a data directory: stock defaults with `config.toml` on top.
pub fn load_config(data_dir: &Path) -> Result<AppConfig, ConfigError> {
    let config = resolve_config(stock_defaults_value(), load_raw_config(data_dir)?)?;
    tracing::debug!(?config, "resolved config");
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Photo Feed Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# This file lives in the data directory (default: .photo-feed/config.toml).
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# SQLite database holding posts and tags (relative to the data directory).
database = "feed.db"

# Directory for image payloads, stored out-of-line and keyed by SHA-256.
blobs_dir = "blobs"

# ---------------------------------------------------------------------------
# Photo import
# ---------------------------------------------------------------------------
[import]
# Photos accepted from one selection. Extra picks are ignored.
max_selection = 1

# What happens when one picked photo fails to load or decode:
#   "fail-fast"   - stop at the first failure and cancel the other loads
#   "skip-failed" - report the failure but keep every photo that loaded
failure_policy = "fail-fast"

# ---------------------------------------------------------------------------
# Feed
# ---------------------------------------------------------------------------
[feed]
# Columns in the rendered post grid.
columns = 2
"##
}
