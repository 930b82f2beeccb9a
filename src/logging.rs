//! Tracing subscriber setup for the ground station binary

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Log file name prefix inside `logging.file_dir`
const LOG_FILE_PREFIX: &str = "groundstation.log";

/// Build the env filter: `RUST_LOG` wins, then the configured level
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber
///
/// Logs go to stdout and, when `file_dir` is set, to a daily-rolling file.
/// Keep the returned guard alive for the life of the process so buffered
/// file output is flushed on exit.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let registry = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer());

    match &config.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_uses_configured_level() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "debug".to_string(),
            file_dir: None,
        };
        assert_eq!(env_filter(&config).to_string(), "debug");
    }
}
