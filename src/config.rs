//! Configuration for the Shutter monitor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time between poll cycles
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Upper bound for any single native query
    #[serde(with = "duration_millis")]
    pub query_timeout: Duration,

    /// In-memory history entries kept for display
    pub history_capacity: usize,

    /// History entries shown on the dashboard
    pub dashboard_entries: usize,

    /// Whether desktop notifications are sent
    pub notifications: bool,

    /// Path for the event journal and session statistics
    pub data_path: PathBuf,

    /// Durable security log
    pub log_path: PathBuf,

    /// Detection heuristics
    pub detection: DetectionConfig,

    /// Panic action settings
    pub mitigation: MitigationConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shutter");
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            poll_interval: Duration::from_secs(2),
            query_timeout: Duration::from_millis(4000),
            history_capacity: 500,
            dashboard_entries: 5,
            notifications: true,
            data_path: data_dir,
            log_path: home.join("shutter_security.log"),
            detection: DetectionConfig::default(),
            mitigation: MitigationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shutter")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_path.join("events.jsonl")
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }
}

/// String heuristics used by the scanners.
///
/// These are hand-tuned and vary between OS releases, so they live in the
/// config file rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Substring identifying camera handles in the open-file table
    pub camera_handle_marker: String,
    /// Substring identifying audio handles in the open-file table
    pub audio_handle_marker: String,
    /// Camera handle owners containing this are OS services
    pub vendor_prefix: String,
    /// I/O registry class of the audio input engine
    pub audio_engine_class: String,
    /// Text present in the engine dump while the microphone is running
    pub engine_active_marker: String,
    /// Audio handle owners containing any of these are system daemons
    pub audio_daemon_allowlist: Vec<String>,
    /// Registry path of the capability access consent store
    pub consent_store_root: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            camera_handle_marker: "CoreMediaIO".to_string(),
            audio_handle_marker: "CoreAudio".to_string(),
            vendor_prefix: "com.apple".to_string(),
            audio_engine_class: "AppleHDAEngineInput".to_string(),
            engine_active_marker: "\"IOAudioEngineState\" = 1".to_string(),
            audio_daemon_allowlist: [
                "com.apple",
                "WindowServer",
                "loginwindow",
                "hidd",
                "Notificat",
                "corespeec",
                "PowerChim",
                "systemsound",
                "ControlCenter",
                "Siri",
                "CallHistory",
                "AudioComponent",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            consent_store_root:
                "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\CapabilityAccessManager\\ConsentStore"
                    .to_string(),
        }
    }
}

/// Settings for the panic action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MitigationConfig {
    /// Targets containing any of these (case-insensitive) are never killed
    pub skip_markers: Vec<String>,
}

impl Default for MitigationConfig {
    fn default() -> Self {
        Self {
            skip_markers: vec!["HIDDEN".to_string()],
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.dashboard_entries, 5);
        assert!(config.notifications);
        assert!(config
            .detection
            .audio_daemon_allowlist
            .iter()
            .any(|d| d == "WindowServer"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"poll_interval": 5, "detection": {"vendor_prefix": "x"}}"#)
                .unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.query_timeout, Duration::from_millis(4000));
        assert_eq!(config.detection.vendor_prefix, "x");
        assert_eq!(config.detection.camera_handle_marker, "CoreMediaIO");
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("shutter-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");

        let mut config = Config::default();
        config.query_timeout = Duration::from_millis(750);
        config.mitigation.skip_markers.push("kernel_task".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.query_timeout, Duration::from_millis(750));
        assert_eq!(loaded.mitigation.skip_markers.len(), 2);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("shutter-does-not-exist").join("config.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.history_capacity, 500);
    }
}
