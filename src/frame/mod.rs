//! # Telemetry Frame Module
//!
//! Definitions and parsing for the CanSat serial wire format.
//!
//! This module handles:
//! - The 12-field comma-separated telemetry line
//! - Numeric channel definitions and column names
//! - Servo/deployment token classification
//! - Line validation with no partially-populated records

pub mod record;
pub mod parser;

pub use parser::parse;
pub use record::{Channel, ServoState, TelemetryRecord, CHANNEL_COUNT, FRAME_FIELD_COUNT};
