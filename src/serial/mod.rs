//! # Serial Ingestion Module
//!
//! Handles the serial link to the CanSat receiver.
//!
//! This module handles:
//! - Opening the serial port (default 115,200 baud, 8N1)
//! - The connection lifecycle state machine
//! - A read loop on its own Tokio task that frames, parses and stores lines
//! - Counting malformed lines without ever ending the session on one
//! - Turning device read failures into a `Failed` state

pub mod line_reader;
pub mod port_trait;

pub use line_reader::{LineRead, LineReader, MAX_LINE_BYTES};
pub use port_trait::{list_ports, PortEntry, PortOpener, SerialLink, TokioSerialOpener};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{GroundStationError, ParseError, Result};
use crate::frame::parser::parse_bytes;
use crate::telemetry::{Clock, SystemClock, TelemetryStore};

/// Default CanSat downlink baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default bound on a single blocking read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection lifecycle as seen by collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Open or read failure; `stop()` then `start()` to recover
    Failed(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

/// Per-session ingestion counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines parsed and appended to the store
    pub frames_accepted: u64,
    /// Lines rejected by the parser or the framer
    pub parse_errors: u64,
    /// Most recent parse or device error message
    pub last_error: Option<String>,
}

/// State shared between the ingester handle and its read task
#[derive(Debug)]
struct SessionStatus {
    state: RwLock<ConnectionState>,
    frames_accepted: AtomicU64,
    parse_errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SessionStatus {
    fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            frames_accepted: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    fn state(&self) -> ConnectionState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_state(&self, state: ConnectionState) {
        debug!("Connection state -> {}", state);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn set_last_error(&self, message: String) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    fn record_accepted(&self) {
        self.frames_accepted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_parse_error(&self, err: &ParseError) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(err.to_string());
    }

    fn fail(&self, reason: String) {
        self.set_last_error(reason.clone());
        self.set_state(ConnectionState::Failed(reason));
    }

    fn reset_counters(&self) {
        self.frames_accepted.store(0, Ordering::Relaxed);
        self.parse_errors.store(0, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn stats(&self) -> IngestStats {
        IngestStats {
            frames_accepted: self.frames_accepted.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            last_error: self.last_error.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }
}

/// Handle to a running read task
struct Session {
    port: String,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Serial ingester: the only writer into a [`TelemetryStore`]
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use cansat_groundstation::serial::SerialIngester;
/// use cansat_groundstation::telemetry::TelemetryStore;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let store = Arc::new(TelemetryStore::new());
///     let mut ingester = SerialIngester::new(Arc::clone(&store));
///
///     ingester.start("/dev/ttyUSB0", 115_200)?;
///     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
///     ingester.stop().await?;
///
///     println!("Received {} records", store.len());
///     Ok(())
/// }
/// ```
pub struct SerialIngester {
    opener: Arc<dyn PortOpener>,
    clock: Arc<dyn Clock>,
    store: Arc<TelemetryStore>,
    read_timeout: Duration,
    status: Arc<SessionStatus>,
    session: Option<Session>,
}

impl fmt::Debug for SerialIngester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialIngester")
            .field("state", &self.status.state())
            .field("port", &self.session.as_ref().map(|s| s.port.as_str()))
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialIngester {
    /// Create an ingester for real serial devices and the system clock
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        Self::with_parts(store, Arc::new(TokioSerialOpener), Arc::new(SystemClock))
    }

    /// Create an ingester with custom device and clock implementations
    pub fn with_parts(
        store: Arc<TelemetryStore>,
        opener: Arc<dyn PortOpener>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            opener,
            clock,
            store,
            read_timeout: DEFAULT_READ_TIMEOUT,
            status: Arc::new(SessionStatus::new()),
            session: None,
        }
    }

    /// Set the per-read timeout (also the upper bound on `stop()` latency)
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.status.state()
    }

    /// Counters for the current (or last) session
    pub fn stats(&self) -> IngestStats {
        self.status.stats()
    }

    /// Port of the active session, if any
    pub fn port(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.port.as_str())
    }

    /// Open `port` and start the read loop
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The ingester is not `Disconnected` (`InvalidState`)
    /// - The device cannot be opened (`DeviceOpen`); the state becomes `Failed`
    pub fn start(&mut self, port: &str, baud_rate: u32) -> Result<()> {
        let state = self.status.state();
        if state != ConnectionState::Disconnected {
            return Err(GroundStationError::InvalidState(format!(
                "start requires Disconnected, ingester is {}",
                state
            )));
        }

        self.status.reset_counters();
        self.status.set_state(ConnectionState::Connecting);
        info!("Opening serial port {} at {} baud", port, baud_rate);

        let link = match self.opener.open(port, baud_rate) {
            Ok(link) => link,
            Err(e) => {
                warn!("Failed to open {}: {}", port, e);
                self.status.fail(e.to_string());
                return Err(GroundStationError::DeviceOpen {
                    port: port.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        self.status.set_state(ConnectionState::Connected);
        info!("Connected to {}", port);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let read_loop = ReadLoop {
            reader: LineReader::new(link),
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            status: Arc::clone(&self.status),
            read_timeout: self.read_timeout,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(read_loop.run());

        self.session = Some(Session {
            port: port.to_string(),
            shutdown,
            task,
        });
        Ok(())
    }

    /// Stop the read loop, close the device and return to `Disconnected`
    ///
    /// Waits for the read task to finish, which takes at most one read
    /// timeout. Safe to call after the loop has already exited on a device
    /// error, and a no-op when already disconnected.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            if self.status.state() != ConnectionState::Disconnected {
                self.status.set_state(ConnectionState::Disconnected);
            }
            return Ok(());
        };

        // The task may already be gone; a closed channel is fine
        let _ = session.shutdown.send(true);
        if let Err(e) = session.task.await {
            error!("Serial read task for {} ended abnormally: {}", session.port, e);
        }

        self.status.set_state(ConnectionState::Disconnected);
        let stats = self.status.stats();
        info!(
            "Disconnected from {} ({} frames, {} parse errors)",
            session.port, stats.frames_accepted, stats.parse_errors
        );
        Ok(())
    }
}

impl Drop for SerialIngester {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.shutdown.send(true);
        }
    }
}

/// Everything the read task owns
struct ReadLoop {
    reader: LineReader<SerialLink>,
    store: Arc<TelemetryStore>,
    clock: Arc<dyn Clock>,
    status: Arc<SessionStatus>,
    read_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl ReadLoop {
    async fn run(mut self) {
        loop {
            let stop_requested = *self.shutdown.borrow();
            if stop_requested {
                debug!("Serial read loop stopping on request");
                return;
            }

            let read = tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    continue;
                }
                read = tokio::time::timeout(self.read_timeout, self.reader.next_line()) => read,
            };

            match read {
                // Serial silence is normal
                Err(_elapsed) => continue,
                Ok(Ok(LineRead::Line(raw))) => self.handle_line(&raw),
                Ok(Ok(LineRead::Overflow)) => self.reject(ParseError::FrameTooLong {
                    limit: self.reader.max_len(),
                }),
                Ok(Ok(LineRead::Eof)) => {
                    self.fail(GroundStationError::DeviceIo(
                        "serial device closed the stream".to_string(),
                    ));
                    return;
                }
                Ok(Err(e)) => {
                    self.fail(GroundStationError::DeviceIo(e.to_string()));
                    return;
                }
            }
        }
    }

    fn handle_line(&self, raw: &[u8]) {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return;
        }

        match parse_bytes(raw) {
            Ok(record) => {
                self.store.append(record, self.clock.now());
                self.status.record_accepted();
            }
            Err(e) => self.reject(e),
        }
    }

    fn reject(&self, err: ParseError) {
        debug!("Dropping telemetry line: {}", err);
        self.status.record_parse_error(&err);
    }

    fn fail(&self, err: GroundStationError) {
        error!("Serial session failed: {}", err);
        self.status.fail(err.to_string());
    }
}
