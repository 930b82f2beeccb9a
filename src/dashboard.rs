//! # Dashboard Module
//!
//! Consumer-side view of the telemetry store, refreshed on a fixed tick.
//!
//! The headless binary logs this summary every refresh interval; a GUI
//! front end would render the same fields into widgets and plots.

use std::fmt;

use chrono::{DateTime, Local};

use crate::frame::{Channel, ServoState};
use crate::serial::{ConnectionState, IngestStats};
use crate::telemetry::{ChannelRange, TelemetryStore};

/// Placeholder for values with no data yet
const NO_DATA: &str = "--";

/// Everything a display needs for one refresh
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub connection: ConnectionState,
    pub stats: IngestStats,
    pub records: usize,
    /// Rows dropped by the retention cap
    pub evicted: u64,
    pub last_packet: Option<DateTime<Local>>,
    pub team_id: Option<String>,
    pub mission_time: Option<String>,
    /// Latest value per channel, indexed by [`Channel::index`]
    pub latest: Option<[f64; crate::frame::CHANNEL_COUNT]>,
    pub servo: Option<ServoState>,
    pub altitude_range: Option<ChannelRange>,
}

impl DashboardSummary {
    /// Build a summary from the store without copying its history
    pub fn from_store(
        store: &TelemetryStore,
        connection: ConnectionState,
        stats: IngestStats,
    ) -> Self {
        let overview = store.overview(Channel::Altitude);
        let latest = overview.latest.as_ref();

        Self {
            connection,
            stats,
            records: overview.len,
            evicted: overview.evicted,
            last_packet: latest.map(|l| l.received_at),
            team_id: latest.map(|l| l.record.team_id.clone()),
            mission_time: latest.map(|l| l.record.mission_time.clone()),
            latest: latest.map(|l| l.record.values),
            servo: latest.map(|l| l.record.servo_state()),
            altitude_range: overview.range,
        }
    }

    /// Latest value of one channel
    pub fn value(&self, channel: Channel) -> Option<f64> {
        self.latest.map(|values| values[channel.index()])
    }
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] records={}", self.connection, self.records)?;
        if self.evicted > 0 {
            write!(f, " evicted={}", self.evicted)?;
        }
        write!(
            f,
            " accepted={} errors={}",
            self.stats.frames_accepted, self.stats.parse_errors
        )?;

        let Some(values) = self.latest else {
            return write!(f, " last packet: {}", NO_DATA);
        };

        write!(
            f,
            " team={} time={}",
            self.team_id.as_deref().unwrap_or(NO_DATA),
            self.mission_time.as_deref().unwrap_or(NO_DATA)
        )?;
        for channel in Channel::ALL {
            write!(f, " {}={}", channel.name(), values[channel.index()])?;
        }
        if let Some(servo) = self.servo {
            write!(f, " servo={}", servo.label())?;
        }
        if let Some(range) = self.altitude_range {
            write!(f, " alt_range=[{}, {}]", range.min, range.max)?;
        }
        if let Some(at) = self.last_packet {
            write!(f, " last packet: {}", at.format("%H:%M:%S"))?;
        }
        Ok(())
    }
}
