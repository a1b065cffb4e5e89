//! Monitor state and the per-tick transition logic.
//!
//! Alerts fire only on the Safe to unsafe edge. A persisting intrusion, or a
//! switch between Active and Sketchy, only recolors the indicator.

use crate::core::classifier::{classify, IndicatorColor, Verdict};
use crate::core::history::{HistoryEntry, HistoryLog};
use crate::scanner::types::ThreatList;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Edge between the previous and current verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Safe to Active/Sketchy
    Raised,
    /// Active/Sketchy to Safe
    Cleared,
    /// No change in the alerting flag
    Unchanged,
}

/// Compute the edge between two verdicts.
pub fn transition(previous: Verdict, next: Verdict) -> Edge {
    match (previous.is_alerting(), next.is_alerting()) {
        (false, true) => Edge::Raised,
        (true, false) => Edge::Cleared,
        _ => Edge::Unchanged,
    }
}

/// A notification requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

/// Side effects requested by one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub verdict: Verdict,
    pub edge: Edge,
    /// Always set; reapplied every tick
    pub indicator: IndicatorColor,
    /// New history entry, if the alerting flag changed
    pub entry: Option<HistoryEntry>,
    /// Notification to send, only on a raised edge
    pub alert: Option<Alert>,
}

/// The aggregate the poll loop writes and the UI reads.
#[derive(Debug, Clone)]
pub struct MonitorState {
    verdict: Verdict,
    threats: ThreatList,
    history: HistoryLog,
    last_scan: Option<DateTime<Utc>>,
    ticks: u64,
}

impl MonitorState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            verdict: Verdict::Safe,
            threats: ThreatList::new(),
            history: HistoryLog::new(history_capacity),
            last_scan: None,
            ticks: 0,
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn threats(&self) -> &ThreatList {
        &self.threats
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.last_scan
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Replace the threat list with this tick's and advance the state machine.
    pub fn apply(&mut self, threats: ThreatList, now: DateTime<Utc>) -> TickOutcome {
        let classification = classify(&threats);
        let previous = self.verdict;
        let next = classification.verdict;
        let edge = transition(previous, next);

        let (entry, alert) = match edge {
            Edge::Raised => {
                let summary = threats.summary();
                let alert = Alert {
                    title: "PRIVACY ALERT".to_string(),
                    message: format!("Active: {summary}"),
                };
                (Some(HistoryEntry::alert(now, previous, next, summary)), Some(alert))
            }
            Edge::Cleared => (Some(HistoryEntry::clear(now, previous)), None),
            Edge::Unchanged => (None, None),
        };

        if let Some(ref entry) = entry {
            self.history.push(entry.clone());
        }
        self.verdict = next;
        self.threats = threats;
        self.last_scan = Some(now);
        self.ticks += 1;

        TickOutcome {
            verdict: next,
            edge,
            indicator: next.indicator(),
            entry,
            alert,
        }
    }

    /// Consistent copy for readers, with the last `recent` history entries.
    pub fn snapshot(&self, recent: usize) -> MonitorSnapshot {
        MonitorSnapshot {
            verdict: self.verdict,
            threats: self.threats.clone(),
            recent_history: self.history.recent(recent),
            last_scan: self.last_scan,
            ticks: self.ticks,
        }
    }
}

/// Read-only copy of the monitor state.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub verdict: Verdict,
    pub threats: ThreatList,
    pub recent_history: Vec<HistoryEntry>,
    pub last_scan: Option<DateTime<Utc>>,
    pub ticks: u64,
}

/// Thread-safe handle to the monitor state.
///
/// The writer replaces verdict, threats and history under one write lock, so
/// readers never see a verdict that disagrees with its threat list.
#[derive(Debug, Clone)]
pub struct StateHandle {
    inner: Arc<RwLock<MonitorState>>,
}

impl StateHandle {
    pub fn new(state: MonitorState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Apply a tick's threat list atomically.
    pub fn apply(&self, threats: ThreatList, now: DateTime<Utc>) -> TickOutcome {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.apply(threats, now)
    }

    pub fn snapshot(&self, recent: usize) -> MonitorSnapshot {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.snapshot(recent)
    }

    /// The threat list produced by the last tick.
    pub fn threats(&self) -> ThreatList {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.threats().clone()
    }

    pub fn verdict(&self) -> Verdict {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.verdict()
    }
}
