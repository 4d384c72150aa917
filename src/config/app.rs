//! Platform configuration loading from config.toml
//!
//! This module provides functionality to load deployment-level settings that
//! are fixed per installation rather than tunable at runtime: the official
//! referral channel, the admin allow-list, and the retention sweep cadence.
//! Runtime-tunable values (bonus amounts, withdrawal minimums) live in the
//! `app_settings` table instead.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Deployment-level platform settings
    pub platform: PlatformConfig,
}

/// Deployment-level settings for one platform installation
#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    /// The official channel whose verified joins release referral bonuses,
    /// e.g. `"@rewards_official"`
    pub referral_channel: String,
    /// Telegram ids allowed to call admin operations (settlement, reports)
    #[serde(default)]
    pub admin_telegram_ids: Vec<String>,
    /// Seconds between retention sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

const fn default_sweep_interval_secs() -> u64 {
    3600
}

impl PlatformConfig {
    /// Returns true if the given Telegram id is on the admin allow-list.
    #[must_use]
    pub fn is_admin(&self, telegram_id: &str) -> bool {
        self.admin_telegram_ids.iter().any(|id| id == telegram_id)
    }
}

/// Loads platform configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads platform configuration from the default location (./config.toml)
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_default_config() -> Result<Config> {
    load_config("config.toml")
}
