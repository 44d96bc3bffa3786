//! Tracing initialization: console output plus an optional log file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter, e.g. `SEGMENTATION_LOG=segmentforge=debug`.
pub const LOG_ENV: &str = "SEGMENTATION_LOG";

/// Initialize logging to stderr and, when `log_file` is set, append to that file.
///
/// `SEGMENTATION_LOG` takes precedence over the level implied by `verbose`.
/// Calling this more than once keeps the first subscriber.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init();

    // try_init only fails when a global subscriber is already set.
    if let Err(err) = installed {
        tracing::debug!(error = %err, "global subscriber already installed; keeping it");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_logging_creates_log_directory() {
        let dir = tempdir().unwrap();
        let log_file = dir.path().join("logs").join("segmentation.log");

        init_logging(false, Some(&log_file)).unwrap();
        assert!(log_file.exists());

        // second call is a no-op
        init_logging(true, None).unwrap();
    }
}
