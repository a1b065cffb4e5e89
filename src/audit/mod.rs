//! Audit trail for the Shutter monitor.
//!
//! This module records what the monitor saw and did: a durable journal of
//! transitions and kill attempts, and running session counters.

pub mod journal;
pub mod stats;

// Re-export commonly used types
pub use journal::{EventJournal, JournalError, JournalRecord};
pub use stats::{MonitorStats, SharedMonitorStats, StatsSnapshot};
