use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directory for the rolling log files: $XDG_DATA_HOME/fundview/logs.
pub fn log_dir() -> PathBuf {
  dirs::data_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join("fundview")
    .join("logs")
}

/// Install the global subscriber writing to a daily log file.
///
/// RUST_LOG wins over `level`; without either the filter is "info".
/// Keep the returned guard alive until exit so buffered lines get flushed.
pub fn init(level: Option<&str>) -> Result<WorkerGuard> {
  let dir = log_dir();
  std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "fundview.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
    .unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(env_filter)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}
