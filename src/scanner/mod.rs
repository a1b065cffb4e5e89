//! Hardware access scanning for the Shutter monitor.
//!
//! Each platform has its own way of revealing who is using the camera and
//! microphone. The variant is chosen once at startup by `platform_scanner`
//! and used for the life of the process.

pub mod macos;
pub mod noop;
pub mod query;
pub mod types;
pub mod windows;

// Re-export commonly used types
pub use self::macos::MacScanner;
pub use self::noop::NoopScanner;
pub use self::query::{CommandQuery, NativeQuery, QueryError};
pub use self::types::{Device, Finding, Origin, ThreatList};
pub use self::windows::{ConsentEntry, ConsentStore, WindowsScanner};

use crate::config::Config;
use crate::platform::Platform;
use crate::shutdown::ShutdownSignal;

/// Produces the current set of hardware-access findings.
///
/// Implementations never fail: a source that errors or times out simply
/// contributes no findings to this poll.
pub trait Scanner: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Run one scan.
    fn scan(&self) -> ThreatList;
}

impl<S: Scanner + ?Sized> Scanner for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn scan(&self) -> ThreatList {
        (**self).scan()
    }
}

/// Build the scanner for the host platform.
pub fn platform_scanner(config: &Config, signal: ShutdownSignal) -> Box<dyn Scanner> {
    match Platform::current() {
        Platform::MacOs => Box::new(MacScanner::new(
            CommandQuery::new(config.query_timeout, signal),
            config.detection.clone(),
        )),
        #[cfg(target_os = "windows")]
        Platform::Windows => Box::new(WindowsScanner::new(
            self::windows::RegistryConsentStore,
            &config.detection,
            config.query_timeout,
            signal,
        )),
        _ => Box::new(NoopScanner),
    }
}
