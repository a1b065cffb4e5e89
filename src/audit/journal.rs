//! Durable event journal.
//!
//! Every history entry and every kill attempt is appended as one JSON line.
//! Unlike the in-memory history the journal is never truncated.

use crate::core::history::HistoryEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One line of the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalRecord {
    Transition {
        host: String,
        entry: HistoryEntry,
    },
    KillAttempt {
        timestamp: DateTime<Utc>,
        host: String,
        target: String,
        /// Whether the termination request could be dispatched
        requested: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
}

/// Journal errors.
#[derive(Debug)]
pub enum JournalError {
    Io(std::io::Error),
    Serialize(String),
}

impl std::fmt::Display for JournalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalError::Io(e) => write!(f, "Journal IO error: {e}"),
            JournalError::Serialize(e) => write!(f, "Journal serialize error: {e}"),
        }
    }
}

impl std::error::Error for JournalError {}

impl From<std::io::Error> for JournalError {
    fn from(e: std::io::Error) -> Self {
        JournalError::Io(e)
    }
}

/// Append-only JSON-lines journal.
#[derive(Debug, Clone)]
pub struct EventJournal {
    path: PathBuf,
    host: String,
}

impl EventJournal {
    pub fn new(path: PathBuf) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        Self { path, host }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn record_transition(&self, entry: &HistoryEntry) -> Result<(), JournalError> {
        self.append(&JournalRecord::Transition {
            host: self.host.clone(),
            entry: entry.clone(),
        })
    }

    pub fn record_kill(&self, target: &str, error: Option<String>) -> Result<(), JournalError> {
        self.append(&JournalRecord::KillAttempt {
            timestamp: Utc::now(),
            host: self.host.clone(),
            target: target.to_string(),
            requested: error.is_none(),
            error,
        })
    }

    fn append(&self, record: &JournalRecord) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut line =
            serde_json::to_string(record).map_err(|e| JournalError::Serialize(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Read every record, skipping lines that fail to parse.
    pub fn read_all(&self) -> Result<Vec<JournalRecord>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Ok(record) = serde_json::from_str::<JournalRecord>(&line) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// The last `n` transition entries, oldest first.
    pub fn recent_transitions(&self, n: usize) -> Result<Vec<HistoryEntry>, JournalError> {
        let entries: Vec<HistoryEntry> = self
            .read_all()?
            .into_iter()
            .filter_map(|record| match record {
                JournalRecord::Transition { entry, .. } => Some(entry),
                JournalRecord::KillAttempt { .. } => None,
            })
            .collect();
        let skip = entries.len().saturating_sub(n);
        Ok(entries.into_iter().skip(skip).collect())
    }
}
