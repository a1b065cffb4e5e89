//! The polling loop.
//!
//! One tick is: scan, classify, advance the state machine, then carry out
//! whatever the state machine asked for (history journal, notification,
//! indicator). The loop runs on its own thread and is the only writer of the
//! shared `MonitorState`.

use crate::audit::{EventJournal, SharedMonitorStats};
use crate::core::history::EntryKind;
use crate::core::state::{StateHandle, TickOutcome};
use crate::notify::{Indicator, Notifier};
use crate::scanner::Scanner;
use crate::shutdown::ShutdownSignal;
use chrono::Utc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a poll cycle reads from and writes to.
pub struct PollLoop {
    scanner: Box<dyn Scanner>,
    state: StateHandle,
    notifier: Arc<dyn Notifier>,
    indicator: Arc<dyn Indicator>,
    journal: Option<EventJournal>,
    stats: Option<SharedMonitorStats>,
}

impl PollLoop {
    pub fn new(
        scanner: Box<dyn Scanner>,
        state: StateHandle,
        notifier: Arc<dyn Notifier>,
        indicator: Arc<dyn Indicator>,
    ) -> Self {
        Self {
            scanner,
            state,
            notifier,
            indicator,
            journal: None,
            stats: None,
        }
    }

    pub fn with_journal(mut self, journal: EventJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_stats(mut self, stats: SharedMonitorStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Run one poll cycle.
    pub fn tick(&self) -> TickOutcome {
        let threats = self.scanner.scan();
        let outcome = self.state.apply(threats, Utc::now());

        // Reapplied every tick to correct any drift in the indicator.
        self.indicator.set_color(outcome.indicator);

        if let Some(ref entry) = outcome.entry {
            match entry.kind {
                EntryKind::Alert => warn!("Detection: {}", entry.summary),
                EntryKind::Clear => info!("Clear"),
            }
            if let Some(ref journal) = self.journal {
                if let Err(e) = journal.record_transition(entry) {
                    debug!("could not journal transition: {e}");
                }
            }
            if let Some(ref stats) = self.stats {
                match entry.kind {
                    EntryKind::Alert => stats.record_alert(),
                    EntryKind::Clear => stats.record_clear(),
                }
            }
        }

        if let Some(ref alert) = outcome.alert {
            self.notifier.notify(&alert.title, &alert.message);
        }

        if let Some(ref stats) = self.stats {
            stats.record_poll();
        }
        outcome
    }

    /// Tick every `interval` until `signal` fires.
    ///
    /// The wait between ticks wakes as soon as shutdown is requested.
    pub fn run(self, interval: Duration, signal: ShutdownSignal) {
        info!("Service Started ({} scanner)", self.scanner.name());
        while !signal.is_triggered() {
            self.tick();
            if signal.wait_timeout(interval) {
                break;
            }
        }
        info!("Service Stopped");
    }
}

/// Monitor errors.
#[derive(Debug)]
pub enum MonitorError {
    AlreadyRunning,
    ThreadSpawnFailed(String),
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::AlreadyRunning => write!(f, "Monitor is already running"),
            MonitorError::ThreadSpawnFailed(e) => write!(f, "Failed to start poll thread: {e}"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Runs a `PollLoop` on a background thread.
pub struct Monitor {
    state: StateHandle,
    interval: Duration,
    signal: ShutdownSignal,
    poll: Option<PollLoop>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(poll: PollLoop, interval: Duration, signal: ShutdownSignal) -> Self {
        Self {
            state: poll.state().clone(),
            interval,
            signal,
            poll: Some(poll),
            thread_handle: None,
        }
    }

    /// Handle for readers of the monitor state.
    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Start polling in a background thread.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        let poll = self.poll.take().ok_or(MonitorError::AlreadyRunning)?;
        let interval = self.interval;
        let signal = self.signal.clone();

        let handle = thread::Builder::new()
            .name("shutter-poll".to_string())
            .spawn(move || poll.run(interval, signal))
            .map_err(|e| MonitorError::ThreadSpawnFailed(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Check if the poll thread is running.
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the poll thread to exit after shutdown was triggered.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("poll thread panicked");
            }
        }
    }
}
