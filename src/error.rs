//! # Error Types
//!
//! Custom error types for the ground station using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the ground station
#[derive(Debug, Error)]
pub enum GroundStationError {
    /// Serial device could not be opened (missing, busy, permission denied)
    #[error("Failed to open serial port {port}: {reason}")]
    DeviceOpen { port: String, reason: String },

    /// Read failure on an open serial session
    #[error("Serial I/O error: {0}")]
    DeviceIo(String),

    /// Lifecycle operation requested from the wrong connection state
    #[error("Invalid ingester state: {0}")]
    InvalidState(String),

    /// CSV export target could not be written
    #[error("Failed to export CSV to {}: {source}", path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a single telemetry line is rejected.
///
/// These never end a session: the ingester counts them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer than the required number of comma-separated fields
    #[error("malformed frame: expected at least 12 fields, got {fields}")]
    MalformedFrame { fields: usize },

    /// A numeric field did not parse as a finite decimal number
    #[error("invalid numeric value {value:?} in field {index}")]
    InvalidNumeric { index: usize, value: String },

    /// Line bytes were not valid UTF-8
    #[error("frame is not valid UTF-8")]
    InvalidEncoding,

    /// No line terminator within the frame length limit
    #[error("frame exceeds {limit} bytes without a line terminator")]
    FrameTooLong { limit: usize },
}

/// Result type alias for the ground station
pub type Result<T> = std::result::Result<T, GroundStationError>;
