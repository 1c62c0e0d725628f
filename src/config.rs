//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BrickError, Result};
use crate::uplink::probe::parse_target;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "BRICK_CONFIG";

/// Configuration file used when `BRICK_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/brick.toml";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub uploader: UploaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local outbox database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Uploader configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UploaderConfig {
    /// Upload cycle period (T_upload)
    #[serde(default = "default_period_s")]
    pub period_s: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_upload_timeout_ms")]
    pub upload_timeout_ms: u64,

    /// Wait after a network interface reset before re-probing
    #[serde(default = "default_settle_delay_s")]
    pub settle_delay_s: u64,

    #[serde(default = "default_wlan_interface")]
    pub wlan_interface: String,

    #[serde(default = "default_reset_command")]
    pub reset_command: Vec<String>,

    /// Bound on the reset command; it is killed when exceeded
    #[serde(default = "default_reset_timeout_s")]
    pub reset_timeout_s: u64,

    #[serde(default = "default_cert_dir")]
    pub cert_dir: String,

    /// Root CA used to verify the twin endpoint, relative to `cert_dir`
    #[serde(default)]
    pub ca_cert: Option<String>,

    /// Explicit "host:port" to probe instead of the first tracker endpoint
    #[serde(default)]
    pub probe_target: Option<String>,

    #[serde(default)]
    pub trackers: BTreeMap<String, TrackerEntry>,
}

/// One tracker routed through this gateway
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrackerEntry {
    #[serde(default)]
    pub name: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rotated log files; empty logs to stdout only
    #[serde(default)]
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

// Default value functions
fn default_database_path() -> String { "data/brick.sqlite3".to_string() }
fn default_table() -> String { "readings".to_string() }
fn default_busy_timeout_ms() -> u64 { 5000 }

fn default_period_s() -> u64 { 60 }
fn default_probe_timeout_ms() -> u64 { 2000 }
fn default_upload_timeout_ms() -> u64 { 30000 }
fn default_settle_delay_s() -> u64 { 10 }
fn default_wlan_interface() -> String { "wlan0".to_string() }
fn default_reset_command() -> Vec<String> {
    ["sudo", "systemctl", "restart", "dhcpcd.service"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_reset_timeout_s() -> u64 { 60 }
fn default_cert_dir() -> String { "certs".to_string() }

fn default_log_level() -> String { "info".to_string() }

pub(crate) fn invalid(message: impl std::fmt::Display) -> BrickError {
    BrickError::Config(toml::de::Error::custom(message))
}

/// SQL identifiers are interpolated into statements, so only plain names pass
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl UploaderConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_s)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_s)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_s)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use riot_brick::config::Config;
    ///
    /// let config = Config::load("config/brick.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.database.path.is_empty() {
            return Err(invalid("database path cannot be empty"));
        }

        if !is_sql_identifier(&self.database.table) {
            return Err(invalid(format!(
                "database table '{}' must be a plain SQL identifier",
                self.database.table
            )));
        }

        if self.database.busy_timeout_ms == 0 || self.database.busy_timeout_ms > 60000 {
            return Err(invalid("busy_timeout_ms must be between 1 and 60000"));
        }

        if self.uploader.period_s == 0 || self.uploader.period_s > 86400 {
            return Err(invalid("period_s must be between 1 and 86400"));
        }

        if self.uploader.probe_timeout_ms == 0 || self.uploader.probe_timeout_ms > 60000 {
            return Err(invalid("probe_timeout_ms must be between 1 and 60000"));
        }

        if self.uploader.upload_timeout_ms == 0 || self.uploader.upload_timeout_ms > 300000 {
            return Err(invalid("upload_timeout_ms must be between 1 and 300000"));
        }

        if self.uploader.settle_delay_s > 300 {
            return Err(invalid("settle_delay_s must be at most 300"));
        }

        if self.uploader.reset_timeout_s == 0 || self.uploader.reset_timeout_s > 600 {
            return Err(invalid("reset_timeout_s must be between 1 and 600"));
        }

        if self.uploader.reset_command.is_empty() {
            return Err(invalid("reset_command cannot be empty"));
        }

        if self.uploader.trackers.is_empty() {
            return Err(invalid("at least one tracker must be configured"));
        }

        if let Some(target) = &self.uploader.probe_target {
            if parse_target(target).is_none() {
                return Err(invalid(format!("probe_target '{}' must be host:port", target)));
            }
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}
