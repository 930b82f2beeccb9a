//! # CanSat Ground Station
//!
//! Headless telemetry ground station for a CanSat serial downlink.
//!
//! Reads `TEAM_ID,TIME,ALT,PRESSURE,TEMP,AX,AY,AZ,GX,GY,GZ,SERVO` lines from a
//! serial port, keeps the history in memory, logs a dashboard summary every
//! refresh interval and exports everything to CSV on exit.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use cansat_groundstation::config::Config;
use cansat_groundstation::dashboard::DashboardSummary;
use cansat_groundstation::logging;
use cansat_groundstation::serial::{list_ports, ConnectionState, SerialIngester};
use cansat_groundstation::telemetry::{export_csv, TelemetryStore};

#[derive(Parser)]
#[command(name = "cansat-groundstation")]
#[command(about = "CanSat telemetry ground station", version)]
struct Cli {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest telemetry until Ctrl+C (default)
    Run {
        /// Serial port, overrides `serial.port`
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate, overrides `serial.baud_rate`
        #[arg(short, long)]
        baud: Option<u32>,

        /// CSV export path, overrides `export.path`
        #[arg(short, long)]
        export: Option<String>,
    },
    /// List serial devices visible to this host
    ListPorts,
}

/// Main entry point for the ground station
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load and validate configuration, apply CLI overrides
///    - Set up logging with tracing subscriber
///    - Open the serial port and start the ingestion task
///
/// 2. **Main Loop**
///    - Log a dashboard summary every refresh interval
///    - Reconnect after device failures when `serial.auto_reconnect` is set
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Stop the ingestion task and close the port
///    - Export the telemetry history to CSV
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let command = cli.command.unwrap_or(Commands::Run {
        port: None,
        baud: None,
        export: None,
    });

    if let Commands::Run { port, baud, export } = &command {
        if let Some(port) = port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = baud {
            config.serial.baud_rate = *baud;
        }
        if let Some(export) = export {
            config.export.path = export.clone();
        }
        config.validate().context("Invalid command line override")?;
    }

    let _log_guard = logging::init(&config.logging);

    match command {
        Commands::Run { .. } => run(config).await,
        Commands::ListPorts => print_ports(),
    }
}

fn print_ports() -> Result<()> {
    let ports = list_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port.display);
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    info!("CanSat Ground Station v{} starting...", env!("CARGO_PKG_VERSION"));

    let retention = NonZeroUsize::new(config.telemetry.max_records)
        .context("telemetry.max_records must be greater than 0")?;
    let store = Arc::new(TelemetryStore::with_retention(retention));
    if let Some(cap) = store.retention() {
        info!("Keeping at most {} records in memory", cap);
    }
    let mut ingester = SerialIngester::new(Arc::clone(&store))
        .with_read_timeout(config.serial.read_timeout());

    let port = config.serial.port.as_str();
    let baud_rate = config.serial.baud_rate;

    if let Err(e) = ingester.start(port, baud_rate) {
        if !config.serial.auto_reconnect {
            return Err(e).context("Failed to start serial ingestion");
        }
        warn!("{}; retrying every {:?}", e, config.serial.reconnect_interval());
    }

    let mut refresh = interval(config.telemetry.refresh_interval());
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reconnect = interval(config.serial.reconnect_interval());
    reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                let summary = DashboardSummary::from_store(
                    &store,
                    ingester.connection_state(),
                    ingester.stats(),
                );
                info!("{}", summary);
            }

            _ = reconnect.tick(), if config.serial.auto_reconnect => {
                if let ConnectionState::Failed(reason) = ingester.connection_state() {
                    info!("Reconnecting to {} after failure: {}", port, reason);
                    ingester.stop().await?;
                    if let Err(e) = ingester.start(port, baud_rate) {
                        warn!("Reconnect failed: {}", e);
                    }
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    ingester.stop().await?;
    let stats = ingester.stats();
    info!(
        "Session totals: {} records stored ({} evicted), {} frames accepted, {} parse errors",
        store.len(),
        store.evicted(),
        stats.frames_accepted,
        stats.parse_errors
    );

    if config.export.on_exit {
        export_csv(&store, &config.export.path)?;
    }

    Ok(())
}
