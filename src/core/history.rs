//! Bounded record of verdict transitions.
//!
//! The in-memory log is a ring buffer: once full, the oldest entry is dropped.
//! Full history goes to the durable event journal; trimming to the last few
//! entries for the dashboard is a read-time view.

use crate::core::classifier::Verdict;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// What kind of transition an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Safe to unsafe
    Alert,
    /// Unsafe back to safe
    Clear,
}

/// A single transition event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    pub from: Verdict,
    pub to: Verdict,
    /// Comma-joined threat labels, or "Safe" for a clear
    pub summary: String,
}

impl HistoryEntry {
    pub fn alert(timestamp: DateTime<Utc>, from: Verdict, to: Verdict, summary: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            kind: EntryKind::Alert,
            from,
            to,
            summary,
        }
    }

    pub fn clear(timestamp: DateTime<Utc>, from: Verdict) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            kind: EntryKind::Clear,
            from,
            to: Verdict::Safe,
            summary: "Safe".to_string(),
        }
    }

    /// e.g. `Safe -> Active`
    pub fn transition(&self) -> String {
        format!("{} -> {}", self.from, self.to)
    }

    /// One dashboard line, in local time.
    pub fn display_line(&self) -> String {
        let ts = self.timestamp.with_timezone(&Local).format("%H:%M:%S");
        match self.kind {
            EntryKind::Alert => format!("[{ts}] ALERT {}", self.summary),
            EntryKind::Clear => format!("[{ts}] CLEAR {}", self.summary),
        }
    }
}

/// Fixed-capacity, append-only history.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    total_recorded: u64,
}

impl HistoryLog {
    /// Create a log holding at most `capacity` entries (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total_recorded: 0,
        }
    }

    /// Append an entry, evicting the oldest if full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total_recorded += 1;
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries ever recorded, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
