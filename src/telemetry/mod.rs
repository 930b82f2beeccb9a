//! # Telemetry Module
//!
//! Shared telemetry history and CSV export.
//!
//! This module handles:
//! - The column-oriented, append-only telemetry series
//! - The latest-record snapshot shown on dashboards
//! - Single-writer / multi-reader access via point-in-time snapshots
//! - Optional retention cap to bound memory
//! - CSV export of the stored series

pub mod clock;
pub mod export;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use export::export_csv;
pub use store::{
    ChannelRange, LatestSample, StoreOverview, TelemetrySeries, TelemetrySnapshot, TelemetryStore,
};
