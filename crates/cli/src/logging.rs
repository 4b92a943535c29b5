//! Log stream setup for a single run.
//!
//! Lines go to stderr and, when configured, are appended to a log file. The
//! subscriber is installed as the default for the duration of the returned
//! guard rather than as a process-wide global.

use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::subscriber::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the run's subscriber installed and the file writer flushing.
pub struct LogGuard {
    _default: DefaultGuard,
    _worker: Option<WorkerGuard>,
}

/// Parse a level or filter directive such as `info` or `shadowroute_core=debug`.
pub fn parse_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{}'", level))
}

/// Install the run's subscriber.
///
/// Fails when the level does not parse or the log file can not be opened;
/// callers treat both as run prerequisites and abort before touching any
/// route file.
pub fn init(level: &str, file: Option<&Path>) -> Result<LogGuard> {
    let filter = parse_filter(level)?;

    let (file_layer, worker) = match file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory {}", parent.display())
                })?;
            }
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(log_file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer);

    Ok(LogGuard {
        _default: tracing::subscriber::set_default(subscriber),
        _worker: worker,
    })
}
