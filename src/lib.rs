//! Shutter - hardware privacy monitor.
//!
//! This library watches for use of the camera and microphone, classifies it
//! into a trust verdict, alerts once per intrusion and can terminate the
//! processes involved on request.
//!
//! # What it is not
//!
//! - **Not a security boundary**: detection is best-effort polling of OS
//!   records, not kernel interception
//! - **Not guaranteed prevention**: the panic action asks the OS to kill
//!   processes by name and reports what it asked for
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Shutter Monitor                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────┐        │
//! │  │   Scanner   │──▶│ Classifier  │──▶│ StateMachine │──▶ notify
//! │  │ (per OS)    │   │  (verdict)  │   │  (edges)     │        │
//! │  └─────────────┘   └─────────────┘   └──────────────┘        │
//! │                                             │                 │
//! │                                             ▼                 │
//! │  ┌─────────────┐                     ┌──────────────┐        │
//! │  │  Mitigator  │◀── user action ──── │   History    │        │
//! │  │ (panic)     │                     │  + Journal   │        │
//! │  └─────────────┘                     └──────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use shutter::{config::Config, scanner, shutdown::Shutdown, MonitorState};
//!
//! let config = Config::default();
//! let shutdown = Shutdown::new();
//! let scanner = scanner::platform_scanner(&config, shutdown.signal());
//!
//! let mut state = MonitorState::new(config.history_capacity);
//! let outcome = state.apply(scanner.scan(), chrono::Utc::now());
//! println!("verdict: {}", outcome.verdict);
//! ```

pub mod audit;
pub mod autostart;
pub mod config;
pub mod core;
pub mod logging;
pub mod mitigation;
pub mod monitor;
pub mod notify;
pub mod platform;
pub mod scanner;
pub mod shutdown;

// Re-export key types at crate root for convenience
pub use audit::{EventJournal, MonitorStats, SharedMonitorStats};
pub use config::{Config, DetectionConfig, MitigationConfig};
pub use self::core::{
    classify, HistoryEntry, IndicatorColor, MonitorSnapshot, MonitorState, StateHandle, Verdict,
};
pub use mitigation::{Mitigator, MitigationReport, ProcessKiller};
pub use monitor::{Monitor, PollLoop};
pub use notify::{dashboard_text, Indicator, Notifier};
pub use platform::Platform;
pub use scanner::{Device, Finding, Origin, Scanner, ThreatList};
pub use shutdown::{Shutdown, ShutdownSignal};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the monitor does, for display to users.
pub const ABOUT: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 SHUTTER - HARDWARE PRIVACY MONITOR               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Shutter checks every few seconds whether your camera or         ║
║  microphone is in use, and by whom.                              ║
║                                                                  ║
║  ✓ WHAT IT WATCHES:                                              ║
║    • macOS: processes holding camera/audio handles, and the      ║
║      audio input engine's hardware state                         ║
║    • Windows: open sessions in the privacy consent store         ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Alerts once when hardware goes from idle to in use          ║
║    • Flags "hidden" microphone use with no visible owner         ║
║    • Kills the processes involved, only when you ask             ║
║                                                                  ║
║  ✗ LIMITS:                                                       ║
║    • Best-effort polling, not kernel-level interception          ║
║    • Killing a process is advisory, not a security boundary      ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_about_contents() {
        assert!(ABOUT.contains("SHUTTER"));
        assert!(ABOUT.contains("hidden"));
        assert!(ABOUT.contains("not a security boundary"));
    }
}
