//! # CanSat Ground Station Library
//!
//! Serial telemetry ingestion for a CanSat ground station.
//!
//! This library provides the core pipeline: parsing the comma-separated
//! telemetry downlink, keeping a bounded, time-ordered history that readers
//! can snapshot while ingestion continues, and exporting that history to CSV.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod frame;
pub mod logging;
pub mod serial;
pub mod telemetry;
