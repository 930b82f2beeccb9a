//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{GroundStationError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Telemetry history and display configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

/// CSV export configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ExportConfig {
    #[serde(default = "default_export_path")]
    pub path: String,

    #[serde(default = "default_export_on_exit")]
    pub on_exit: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files; console only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

/// Baud rates accepted for the telemetry downlink
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 1000 }
fn default_auto_reconnect() -> bool { true }
fn default_reconnect_interval_ms() -> u64 { 2000 }

fn default_max_records() -> usize { 100_000 }
fn default_refresh_interval_ms() -> u64 { 1000 }

fn default_export_path() -> String { "telemetry_data.csv".to_string() }
fn default_export_on_exit() -> bool { true }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            auto_reconnect: default_auto_reconnect(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: default_export_path(),
            on_exit: default_export_on_exit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: None,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl TelemetryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
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
    /// use cansat_groundstation::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
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
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                SUPPORTED_BAUD_RATES.map(|b| b.to_string()).join(", ")
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records == 0 {
            return Err(invalid("max_records must be greater than 0"));
        }

        if self.telemetry.refresh_interval_ms == 0 || self.telemetry.refresh_interval_ms > 60000 {
            return Err(invalid("refresh_interval_ms must be between 1 and 60000"));
        }

        if self.export.path.is_empty() {
            return Err(invalid("export path cannot be empty"));
        }

        if matches!(&self.logging.file_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging file_dir cannot be empty when set"));
        }

        Ok(())
    }
}

fn invalid(message: impl std::fmt::Display) -> GroundStationError {
    GroundStationError::Config(toml::de::Error::custom(message))
}
