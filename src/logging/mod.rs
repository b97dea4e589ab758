//! Logging setup
//!
//! Logs go to stderr through `tracing-subscriber`. With file logging on,
//! a daily file in ~/.config/bezy/logs/ receives a copy.

use std::fs;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config_file::ConfigFile;

const LOG_FILE_PREFIX: &str = "bezy-backend";

/// Get the path to the logs directory
pub fn logs_dir() -> PathBuf {
    ConfigFile::config_dir().join("logs")
}

/// Get the path to the current log file
pub fn current_log_file() -> PathBuf {
    let timestamp = chrono::Utc::now().format("%Y-%m-%d");
    logs_dir().join(format!("{LOG_FILE_PREFIX}.{timestamp}"))
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
///
/// The returned guard flushes the log file on drop; keep it alive for the
/// lifetime of the program.
pub fn init(level: &str, log_to_file: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    if !log_to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()?;
        return Ok(None);
    }

    let dir = logs_dir();
    fs::create_dir_all(&dir)?;
    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;
    tracing::info!(
        "=== bezy-backend started at {} ===",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    tracing::info!("Logging to {:?}", current_log_file());
    Ok(Some(guard))
}
