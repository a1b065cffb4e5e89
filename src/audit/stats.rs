//! Session statistics for the monitor.
//!
//! Counts what the monitor did (polls, alerts, clears, kill requests) so the
//! user can see it is alive and what it has acted on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Counters for the current session plus any loaded from disk.
#[derive(Debug)]
pub struct MonitorStats {
    /// Poll cycles completed
    polls: AtomicU64,
    /// Safe to unsafe transitions
    alerts: AtomicU64,
    /// Unsafe to safe transitions
    clears: AtomicU64,
    /// Termination requests issued by the panic action
    kill_requests: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl MonitorStats {
    pub fn new() -> Self {
        Self {
            polls: AtomicU64::new(0),
            alerts: AtomicU64::new(0),
            clears: AtomicU64::new(0),
            kill_requests: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that are saved to (and resumed from) `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            debug!("could not load previous stats: {e}");
        }

        stats
    }

    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kill_requests(&self, count: u64) {
        self.kill_requests.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            kill_requests: self.kill_requests.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Monitor Statistics:\n\
             - Poll cycles: {}\n\
             - Alerts raised: {}\n\
             - Returns to safe: {}\n\
             - Termination requests: {}\n\
             - Session duration: {} seconds",
            stats.polls,
            stats.alerts,
            stats.clears,
            stats.kill_requests,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                polls: stats.polls,
                alerts: stats.alerts,
                clears: stats.clears,
                kill_requests: stats.kill_requests,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = read_persisted(path)?;
                self.polls.store(persisted.polls, Ordering::Relaxed);
                self.alerts.store(persisted.alerts, Ordering::Relaxed);
                self.clears.store(persisted.clears, Ordering::Relaxed);
                self.kill_requests
                    .store(persisted.kill_requests, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub polls: u64,
    pub alerts: u64,
    pub clears: u64,
    pub kill_requests: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStats {
    pub polls: u64,
    pub alerts: u64,
    pub clears: u64,
    pub kill_requests: u64,
    pub last_updated: DateTime<Utc>,
}

/// Read stats saved by a previous session.
pub fn read_persisted(path: &std::path::Path) -> Result<PersistedStats, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(std::io::Error::other)
}

/// Thread-safe shared stats.
pub type SharedMonitorStats = Arc<MonitorStats>;
