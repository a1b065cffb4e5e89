//! User-facing collaborators: notifications, the status indicator and the
//! dashboard text.
//!
//! None of these may fail into the core. Implementations log their own
//! problems and return.

use crate::core::classifier::IndicatorColor;
use crate::core::state::MonitorSnapshot;
use crate::platform::Platform;
use crate::scanner::query::NativeQuery;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Fire-and-forget user notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// The status indicator (tray icon or equivalent).
pub trait Indicator: Send + Sync {
    /// Called every tick, even when the color has not changed.
    fn set_color(&self, color: IndicatorColor);
}

/// Desktop notifications through the host's scripting tools.
///
/// macOS uses `osascript`; other hosts fall back to the console.
pub struct DesktopNotifier<Q: NativeQuery> {
    query: Q,
    platform: Platform,
    app_name: String,
}

impl<Q: NativeQuery> DesktopNotifier<Q> {
    pub fn new(query: Q, platform: Platform) -> Self {
        Self {
            query,
            platform,
            app_name: "Shutter".to_string(),
        }
    }
}

impl<Q: NativeQuery> Notifier for DesktopNotifier<Q> {
    fn notify(&self, title: &str, message: &str) {
        match self.platform {
            Platform::MacOs => {
                let script = notification_script(title, message);
                if let Err(e) = self.query.run("osascript", &["-e", &script]) {
                    debug!("notification failed: {e}");
                }
            }
            Platform::Windows | Platform::Other => {
                println!("[{}] {title}: {message}", self.app_name);
            }
        }
    }
}

/// Escape `text` for use inside an AppleScript string literal.
fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// AppleScript for a notification. Process names end up in the message, so
/// both inputs are escaped.
pub fn notification_script(title: &str, message: &str) -> String {
    let title = applescript_escape(title);
    let message = applescript_escape(message);
    format!("display notification \"{message}\" with title \"{title}\" sound name \"Ping\"")
}

/// A notifier that discards everything, for `--no-notify`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, title: &str, message: &str) {
        debug!("notification suppressed: {title}: {message}");
    }
}

/// Prints the indicator color to the console when it changes.
#[derive(Debug, Default)]
pub struct ConsoleIndicator {
    current: Mutex<Option<IndicatorColor>>,
}

impl ConsoleIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<IndicatorColor> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Indicator for ConsoleIndicator {
    fn set_color(&self, color: IndicatorColor) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != Some(color) {
            info!("indicator: {}", color.color_name());
        }
        *current = Some(color);
    }
}

/// Dashboard text: status, the latest events and where the log lives.
pub fn dashboard_text(snapshot: &MonitorSnapshot, host: &str, log_path: &Path) -> String {
    let logs = if snapshot.recent_history.is_empty() {
        "No events yet.".to_string()
    } else {
        snapshot
            .recent_history
            .iter()
            .map(|e| e.display_line())
            .collect::<Vec<_>>()
            .join("\n")
    };

    let threats = if snapshot.threats.is_empty() {
        "none".to_string()
    } else {
        snapshot.threats.summary()
    };

    format!(
        "Status: {}\n\
         Host: {host}\n\
         Current access: {threats}\n\
         \n\
         Latest Events:\n\
         {logs}\n\
         \n\
         Log Path:\n\
         {}",
        snapshot.verdict.status_text(),
        log_path.display()
    )
}
