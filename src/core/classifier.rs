//! Turns a poll's threat list into a trust verdict.

use crate::scanner::types::ThreatList;
use serde::{Deserialize, Serialize};

/// The monitor's trust classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verdict {
    /// No hardware access observed
    #[default]
    Safe,
    /// Hardware in use by identified subjects
    Active,
    /// Hardware engaged with no attributable process
    Sketchy,
}

impl Verdict {
    /// Active and Sketchy both count as "not safe" for alerting.
    pub fn is_alerting(&self) -> bool {
        !matches!(self, Verdict::Safe)
    }

    /// Indicator color for this verdict.
    pub fn indicator(&self) -> IndicatorColor {
        match self {
            Verdict::Safe => IndicatorColor::Safe,
            Verdict::Active => IndicatorColor::Alert,
            Verdict::Sketchy => IndicatorColor::Sketchy,
        }
    }

    /// Status line used on the dashboard.
    pub fn status_text(&self) -> &'static str {
        match self {
            Verdict::Safe => "Secure",
            Verdict::Active => "HARDWARE ACTIVE",
            Verdict::Sketchy => "HARDWARE ACTIVE (HIDDEN USAGE)",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Safe => write!(f, "Safe"),
            Verdict::Active => write!(f, "Active"),
            Verdict::Sketchy => write!(f, "Sketchy"),
        }
    }
}

/// Color shown by the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorColor {
    Safe,
    Alert,
    Sketchy,
}

impl IndicatorColor {
    pub fn color_name(&self) -> &'static str {
        match self {
            IndicatorColor::Safe => "green",
            IndicatorColor::Alert => "red",
            IndicatorColor::Sketchy => "orange",
        }
    }
}

/// The verdict for a threat list along with its display labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: Verdict,
    pub labels: Vec<String>,
}

/// Classify one poll's findings.
///
/// Empty is Safe; anything carrying the hidden-usage marker is Sketchy;
/// everything else is Active.
pub fn classify(threats: &ThreatList) -> Classification {
    let verdict = if threats.is_empty() {
        Verdict::Safe
    } else if threats.has_hidden() {
        Verdict::Sketchy
    } else {
        Verdict::Active
    };

    Classification {
        verdict,
        labels: threats.labels(),
    }
}
