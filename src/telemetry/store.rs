//! # Telemetry Store
//!
//! Column-oriented telemetry history plus the latest received record.
//!
//! One writer (the serial ingester) appends; any number of readers take
//! point-in-time copies through [`TelemetryStore::snapshot`]. All columns are
//! mutated inside a single write-locked critical section, so a reader can
//! never observe columns of different lengths.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::frame::{Channel, TelemetryRecord, CHANNEL_COUNT};

/// Most recently accepted record and when it arrived
#[derive(Debug, Clone, PartialEq)]
pub struct LatestSample {
    pub received_at: DateTime<Local>,
    pub record: TelemetryRecord,
}

/// Read-only, column-oriented copy of the telemetry history
///
/// Every column has exactly [`len`](Self::len) entries, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySeries {
    received_at: Vec<DateTime<Local>>,
    team_ids: Vec<String>,
    mission_times: Vec<String>,
    servo_tokens: Vec<String>,
    channels: [Vec<f64>; CHANNEL_COUNT],
}

impl TelemetrySeries {
    pub fn len(&self) -> usize {
        self.received_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received_at.is_empty()
    }

    /// Local receipt timestamps (plot x-axis)
    pub fn timestamps(&self) -> &[DateTime<Local>] {
        &self.received_at
    }

    /// Values of one numeric channel
    pub fn channel(&self, channel: Channel) -> &[f64] {
        &self.channels[channel.index()]
    }

    pub fn team_ids(&self) -> &[String] {
        &self.team_ids
    }

    pub fn mission_times(&self) -> &[String] {
        &self.mission_times
    }

    pub fn servo_tokens(&self) -> &[String] {
        &self.servo_tokens
    }

    /// Rebuild the record stored at `index`
    pub fn record(&self, index: usize) -> Option<TelemetryRecord> {
        if index >= self.len() {
            return None;
        }

        Some(TelemetryRecord {
            team_id: self.team_ids[index].clone(),
            mission_time: self.mission_times[index].clone(),
            values: std::array::from_fn(|c| self.channels[c][index]),
            servo: self.servo_tokens[index].clone(),
        })
    }

    /// Iterate over `(received_at, record)` rows in append order
    pub fn rows(&self) -> impl Iterator<Item = (DateTime<Local>, TelemetryRecord)> + '_ {
        (0..self.len()).filter_map(move |i| self.record(i).map(|r| (self.received_at[i], r)))
    }
}

/// Consistent point-in-time view of the store
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    /// Latest record, `None` until the first line is accepted
    pub latest: Option<LatestSample>,

    /// Full retained history
    pub series: TelemetrySeries,

    /// Rows dropped by the retention cap since the last reset
    pub evicted: u64,
}

/// Min/max of one channel over the retained history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRange {
    pub min: f64,
    pub max: f64,
}

impl ChannelRange {
    /// Range of `values`, `None` when empty
    pub fn of<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<Self> {
        let mut values = values.into_iter().copied();
        let first = values.next()?;
        Some(values.fold(Self { min: first, max: first }, |range, v| Self {
            min: range.min.min(v),
            max: range.max.max(v),
        }))
    }
}

/// Store status without the history itself, for periodic consumers
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOverview {
    pub latest: Option<LatestSample>,
    pub len: usize,
    pub evicted: u64,
    /// Range of the requested channel
    pub range: Option<ChannelRange>,
}

/// Live storage; same layout as [`TelemetrySeries`] but cheap to trim at the front.
#[derive(Debug, Default)]
struct SeriesBuffer {
    received_at: VecDeque<DateTime<Local>>,
    team_ids: VecDeque<String>,
    mission_times: VecDeque<String>,
    servo_tokens: VecDeque<String>,
    channels: [VecDeque<f64>; CHANNEL_COUNT],
}

impl SeriesBuffer {
    fn len(&self) -> usize {
        self.received_at.len()
    }

    fn push(&mut self, received_at: DateTime<Local>, record: &TelemetryRecord) {
        self.received_at.push_back(received_at);
        self.team_ids.push_back(record.team_id.clone());
        self.mission_times.push_back(record.mission_time.clone());
        self.servo_tokens.push_back(record.servo.clone());
        for (column, value) in self.channels.iter_mut().zip(record.values) {
            column.push_back(value);
        }
    }

    fn pop_front(&mut self) {
        self.received_at.pop_front();
        self.team_ids.pop_front();
        self.mission_times.pop_front();
        self.servo_tokens.pop_front();
        for column in &mut self.channels {
            column.pop_front();
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn to_series(&self) -> TelemetrySeries {
        TelemetrySeries {
            received_at: self.received_at.iter().copied().collect(),
            team_ids: self.team_ids.iter().cloned().collect(),
            mission_times: self.mission_times.iter().cloned().collect(),
            servo_tokens: self.servo_tokens.iter().cloned().collect(),
            channels: std::array::from_fn(|c| self.channels[c].iter().copied().collect()),
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    series: SeriesBuffer,
    latest: Option<LatestSample>,
    evicted: u64,
}

/// Thread-safe telemetry history
///
/// Share it between the ingester and consumers with `Arc<TelemetryStore>`.
///
/// # Examples
///
/// ```
/// use cansat_groundstation::frame::parse;
/// use cansat_groundstation::telemetry::TelemetryStore;
///
/// let store = TelemetryStore::new();
/// let record = parse("7,00:01:23,120.5,101.3,22.7,0.01,-0.02,9.81,0.1,-0.1,0.0,deployed")?;
/// store.append(record, chrono::Local::now());
///
/// let snapshot = store.snapshot();
/// assert_eq!(snapshot.series.len(), 1);
/// assert!(snapshot.latest.is_some());
/// # Ok::<(), cansat_groundstation::error::ParseError>(())
/// ```
#[derive(Debug, Default)]
pub struct TelemetryStore {
    inner: RwLock<StoreInner>,
    retention: Option<NonZeroUsize>,
}

impl TelemetryStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that keeps at most `max_records` rows, dropping the oldest
    pub fn with_retention(max_records: NonZeroUsize) -> Self {
        Self {
            inner: RwLock::default(),
            retention: Some(max_records),
        }
    }

    /// Configured retention cap, if any
    pub fn retention(&self) -> Option<NonZeroUsize> {
        self.retention
    }

    /// Append one record and make it the latest sample
    pub fn append(&self, record: TelemetryRecord, received_at: DateTime<Local>) {
        let mut inner = self.write();
        inner.series.push(received_at, &record);

        if let Some(cap) = self.retention {
            while inner.series.len() > cap.get() {
                inner.series.pop_front();
                inner.evicted += 1;
            }
        }

        inner.latest = Some(LatestSample { received_at, record });
    }

    /// Copy the current history and latest sample
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let inner = self.read();
        TelemetrySnapshot {
            latest: inner.latest.clone(),
            series: inner.series.to_series(),
            evicted: inner.evicted,
        }
    }

    /// Latest sample, row count, eviction count and one channel's range.
    ///
    /// Scans a single column under the read lock instead of copying the
    /// series, so it is cheap enough for a refresh tick.
    pub fn overview(&self, channel: Channel) -> StoreOverview {
        let inner = self.read();
        StoreOverview {
            latest: inner.latest.clone(),
            len: inner.series.len(),
            evicted: inner.evicted,
            range: ChannelRange::of(&inner.series.channels[channel.index()]),
        }
    }

    /// Latest sample without copying the history
    pub fn latest(&self) -> Option<LatestSample> {
        self.read().latest.clone()
    }

    /// Number of retained rows
    pub fn len(&self) -> usize {
        self.read().series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows dropped by the retention cap since the last reset
    pub fn evicted(&self) -> u64 {
        self.read().evicted
    }

    /// Clear history and latest sample.
    ///
    /// Stop the ingester before calling this.
    pub fn reset(&self) {
        let mut inner = self.write();
        let cleared = inner.series.len();
        inner.series.clear();
        inner.latest = None;
        inner.evicted = 0;
        debug!("Telemetry store reset ({} rows cleared)", cleared);
    }

    // Writers leave the columns consistent before releasing the lock, so a
    // poisoned lock still guards valid data.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
