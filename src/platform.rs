//! Host platform detection.

use serde::{Deserialize, Serialize};

/// The host family the monitor was built for.
///
/// Detection backends and termination commands are chosen from this once at
/// startup, never re-checked per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    MacOs,
    Windows,
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::MacOs => "macOS",
            Platform::Windows => "Windows",
            Platform::Other => "unsupported",
        }
    }

    /// Whether a detection backend exists for this platform.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Platform::Other)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
