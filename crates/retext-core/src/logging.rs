//! Tracing setup: a rolling log file, plus stderr when `RETEXT_LOG` is set.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Filter directives for both layers, e.g. `RETEXT_LOG=retext_core=debug`.
pub const LOG_ENV: &str = "RETEXT_LOG";
const DEFAULT_FILE_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "retext.log";

/// Installs the global subscriber.
///
/// With `log_dir`, events go to a daily-rolling file in that directory. The
/// returned guard flushes the file writer on drop and must be held until exit.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(file_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = std::env::var(LOG_ENV)
        .ok()
        .filter(|directives| !directives.trim().is_empty())
        .map(|directives| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::new(directives))
        });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn file_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILE_FILTER))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_init_creates_log_dir_and_returns_guard() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = init(Some(&log_dir)).unwrap();

        assert!(guard.is_some());
        assert!(log_dir.is_dir());
        assert!(init(None).is_err(), "second install must fail");
    }
}
