//! Application settings loaded from config.toml
//!
//! The settings describe the business timezone used for day bucketing, the store
//! profile shown on documents, and catalog entries (categories, units, suppliers)
//! seeded into the database on first run.

use crate::errors::{Error, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::Path;

/// Minutes east of UTC for Asia/Jakarta, which observes no daylight saving.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 7 * 60;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Business calendar settings
    #[serde(default)]
    pub business: BusinessConfig,
    /// Store profile seeded when the database has none
    #[serde(default)]
    pub store: StoreConfig,
    /// Category names to seed
    #[serde(default)]
    pub categories: Vec<String>,
    /// Unit names to seed
    #[serde(default)]
    pub units: Vec<String>,
    /// Suppliers to seed
    #[serde(default)]
    pub suppliers: Vec<SupplierConfig>,
}

/// Business calendar settings
#[derive(Debug, Deserialize, Clone)]
pub struct BusinessConfig {
    /// Fixed offset of the business timezone from UTC, in minutes
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

const fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl BusinessConfig {
    /// The configured offset as a chrono `FixedOffset`.
    ///
    /// # Errors
    /// Returns `Error::Config` when the offset is a day or more away from UTC.
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| Error::Config {
            message: format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ),
        })
    }
}

/// Store profile settings
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Store display name
    pub name: String,
    /// Store address
    #[serde(default)]
    pub address: String,
    /// Store phone number
    #[serde(default)]
    pub phone: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "Apotek".to_string(),
            address: String::new(),
            phone: String::new(),
        }
    }
}

/// A supplier to seed
#[derive(Debug, Deserialize, Clone)]
pub struct SupplierConfig {
    /// Supplier name
    pub name: String,
    /// Postal address
    pub address: Option<String>,
    /// Contact phone number
    pub phone: Option<String>,
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns `Error::Config` if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads settings from `./config.toml`, falling back to defaults when the file is absent.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if !path.exists() {
        tracing::warn!("config.toml not found, using built-in defaults");
        return Ok(AppConfig::default());
    }
    load_config(path)
}
