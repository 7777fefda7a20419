//! Logging setup
//!
//! Logs go to stderr by default. With `--log <FILE>` they are appended to
//! that file through a non-blocking writer instead, without ANSI colors.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `verbose`. When logging to a file the
/// returned [`WorkerGuard`] must be held until exit so buffered lines are
/// flushed.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = file_layer.is_none().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(guard)
}
