//! Logging setup.
//!
//! Two outputs share one filter: a compact console layer on stderr and a
//! plain-text layer appended to the security log file. The file is the
//! durable record of detections, clears and kill attempts.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging errors.
#[derive(Debug)]
pub enum LoggingError {
    LogFile(String),
    AlreadyInitialized(String),
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggingError::LogFile(e) => write!(f, "Could not open log file: {e}"),
            LoggingError::AlreadyInitialized(e) => write!(f, "Logging already initialized: {e}"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Default filter directive; `RUST_LOG` takes precedence when set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "shutter=debug,info"
    } else {
        "info"
    }
}

/// Install the global subscriber.
///
/// With `log_path` set, events are also appended to that file.
pub fn init(log_path: Option<&Path>, verbose: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let console = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = match log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| LoggingError::LogFile(e.to_string()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| LoggingError::LogFile(format!("{}: {e}", path.display())))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("debug"));
    }

    #[test]
    fn test_unwritable_log_path_is_reported() {
        let dir = std::env::temp_dir().join(format!("shutter-logging-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        // A directory cannot be opened as a log file.
        let result = init(Some(dir.as_path()), false);
        assert!(matches!(result, Err(LoggingError::LogFile(_))));
        let _ = std::fs::remove_dir_all(dir);
    }
}
