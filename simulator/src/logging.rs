use std::{io, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
  EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt,
};

pub const LOG_FILE: &str = "airtraffic.log";

/// Simulation log lines are already printed by the console, so the terminal
/// only sees them when they are warnings.
const TERMINAL_FILTER: &str = "info,simulation=warn";
const FILE_FILTER: &str = "info";

/// Keeps the file writer alive. Dropping it flushes the log file.
#[derive(Debug)]
pub struct LoggingGuard {
  _file_guard: Option<WorkerGuard>,
}

fn env_filter(default: &str) -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Logs to stderr, and to `<log_dir>/airtraffic.log` when a directory is
/// given. `RUST_LOG` overrides both filters.
pub fn init(log_dir: Option<&Path>) -> io::Result<LoggingGuard> {
  let file = match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)?;
      let appender = tracing_appender::rolling::never(dir, LOG_FILE);
      Some(tracing_appender::non_blocking(appender))
    }
    None => None,
  };
  let (writer, file_guard) = file.unzip();

  let terminal_layer = tracing_subscriber::fmt::layer()
    .with_writer(io::stderr)
    .with_filter(env_filter(TERMINAL_FILTER));
  let file_layer = writer.map(|writer| {
    tracing_subscriber::fmt::layer()
      .with_writer(writer)
      .with_ansi(false)
      .with_filter(env_filter(FILE_FILTER))
  });

  tracing_subscriber::registry()
    .with(terminal_layer)
    .with(file_layer)
    .init();

  Ok(LoggingGuard {
    _file_guard: file_guard,
  })
}
