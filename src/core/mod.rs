//! Core detection logic for the Shutter monitor.
//!
//! This module contains:
//! - Classification of threat lists into verdicts
//! - The bounded history of verdict transitions
//! - The state machine that decides when to alert

pub mod classifier;
pub mod history;
pub mod state;

// Re-export commonly used types
pub use classifier::{classify, Classification, IndicatorColor, Verdict};
pub use history::{EntryKind, HistoryEntry, HistoryLog};
pub use state::{transition, Alert, Edge, MonitorSnapshot, MonitorState, StateHandle, TickOutcome};
