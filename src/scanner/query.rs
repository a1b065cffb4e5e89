//! Bounded native queries.
//!
//! Every OS query the scanners make goes through here so that a hung tool or
//! registry call can never stall a poll cycle. Results come back as raw text;
//! all matching and filtering happens in the scanners.

use crate::shutdown::ShutdownSignal;
use crossbeam_channel::{bounded, select};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// Errors from a single native query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The tool could not be started (missing binary, permissions)
    Spawn(String),
    /// The query ran longer than its budget and was abandoned
    TimedOut,
    /// Shutdown was requested while the query was in flight
    Cancelled,
    /// The OS reported a failure (absent registry path, access denied)
    Os(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Spawn(e) => write!(f, "Failed to start query: {e}"),
            QueryError::TimedOut => write!(f, "Query timed out"),
            QueryError::Cancelled => write!(f, "Query cancelled by shutdown"),
            QueryError::Os(e) => write!(f, "OS error: {e}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Injectable boundary for shell-style queries.
pub trait NativeQuery: Send + Sync {
    /// Run `program` with `args` and return its standard output.
    ///
    /// The exit status is ignored: tools like `lsof` exit non-zero while
    /// still printing useful output.
    fn run(&self, program: &str, args: &[&str]) -> Result<String, QueryError>;
}

/// Runs `work` on a helper thread and waits at most `timeout` for it.
///
/// On timeout or shutdown the helper is abandoned; it finishes on its own and
/// its result is discarded.
pub fn run_with_timeout<T, F>(
    timeout: Duration,
    signal: &ShutdownSignal,
    work: F,
) -> Result<T, QueryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, QueryError> + Send + 'static,
{
    let (sender, receiver) = bounded(1);
    thread::Builder::new()
        .name("shutter-query".to_string())
        .spawn(move || {
            let _ = sender.send(work());
        })
        .map_err(|e| QueryError::Spawn(e.to_string()))?;

    select! {
        recv(receiver) -> result => result.unwrap_or(Err(QueryError::Cancelled)),
        recv(signal.receiver()) -> _ => Err(QueryError::Cancelled),
        default(timeout) => Err(QueryError::TimedOut),
    }
}

/// Runs external tools as child processes with a per-query timeout.
#[derive(Debug, Clone)]
pub struct CommandQuery {
    timeout: Duration,
    signal: ShutdownSignal,
}

impl CommandQuery {
    pub fn new(timeout: Duration, signal: ShutdownSignal) -> Self {
        Self { timeout, signal }
    }
}

impl NativeQuery for CommandQuery {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, QueryError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| QueryError::Spawn(format!("{program}: {e}")))?;

        let stdout = child.stdout.take();
        let result = run_with_timeout(self.timeout, &self.signal, move || {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout {
                out.read_to_end(&mut buf)
                    .map_err(|e| QueryError::Os(e.to_string()))?;
            }
            Ok(String::from_utf8_lossy(&buf).into_owned())
        });

        if result.is_err() {
            // Abandon the child rather than wait for it.
            let _ = child.kill();
        }
        let _ = child.wait();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;
    use std::time::Instant;

    #[test]
    fn test_run_with_timeout_returns_value() {
        let result = run_with_timeout(Duration::from_secs(5), &ShutdownSignal::never(), || {
            Ok::<_, QueryError>(42)
        });
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn test_run_with_timeout_abandons_slow_work() {
        let start = Instant::now();
        let result = run_with_timeout(Duration::from_millis(50), &ShutdownSignal::never(), || {
            thread::sleep(Duration::from_secs(2));
            Ok::<_, QueryError>(())
        });
        assert_eq!(result, Err(QueryError::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_run_with_timeout_observes_shutdown() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let result = run_with_timeout(Duration::from_secs(5), &shutdown.signal(), || {
            thread::sleep(Duration::from_secs(2));
            Ok::<_, QueryError>(())
        });
        assert_eq!(result, Err(QueryError::Cancelled));
    }

    #[test]
    fn test_missing_tool_is_spawn_error() {
        let query = CommandQuery::new(Duration::from_secs(1), ShutdownSignal::never());
        let result = query.run("shutter-definitely-not-a-real-tool", &[]);
        assert!(matches!(result, Err(QueryError::Spawn(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_output_captured() {
        let query = CommandQuery::new(Duration::from_secs(5), ShutdownSignal::never());
        let out = query.run("echo", &["hello"]).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_command_times_out() {
        let query = CommandQuery::new(Duration::from_millis(100), ShutdownSignal::never());
        let start = Instant::now();
        assert_eq!(query.run("sleep", &["5"]), Err(QueryError::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
