//! Scanner for hosts without a detection backend.
//!
//! This exists so the crate (and binary) build and run their core logic on
//! targets other than macOS and Windows. It never reports anything.

use crate::scanner::types::ThreatList;
use crate::scanner::Scanner;

/// A scanner that always returns an empty threat list.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScanner;

impl Scanner for NoopScanner {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn scan(&self) -> ThreatList {
        ThreatList::new()
    }
}
