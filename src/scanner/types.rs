//! Finding types produced by the scanners.
//!
//! A finding lives for one poll cycle only. The `ThreatList` built from a
//! cycle's findings replaces the previous one wholesale.

use serde::{Deserialize, Serialize};

/// Which piece of privacy-sensitive hardware was accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    Camera,
    Microphone,
}

impl Device {
    /// Short tag appended to finding labels.
    pub fn tag(&self) -> &'static str {
        match self {
            Device::Camera => "Camera",
            Device::Microphone => "Mic",
        }
    }
}

/// Where a finding was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// An open handle in the process/file-handle table
    ProcessList,
    /// The hardware reports itself engaged but no owner was found
    HardwareFlag,
    /// An open session in the OS consent store
    ConsentStore,
}

/// One detected instance of hardware access attributed to a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Process or app label; empty when nothing could be attributed
    pub subject: String,
    /// Hardware being accessed
    pub device: Device,
    /// Source of the observation
    pub origin: Origin,
    /// Came from a classic (non-packaged) executable rather than an app package
    pub executable: bool,
}

impl Finding {
    /// A finding from a process handle table.
    pub fn process(subject: impl Into<String>, device: Device) -> Self {
        Self {
            subject: subject.into(),
            device,
            origin: Origin::ProcessList,
            executable: false,
        }
    }

    /// A finding from a consent store session.
    pub fn consent(subject: impl Into<String>, device: Device, executable: bool) -> Self {
        Self {
            subject: subject.into(),
            device,
            origin: Origin::ConsentStore,
            executable,
        }
    }

    /// The synthetic "hidden usage" marker: microphone hardware is engaged
    /// but no process could be found holding it.
    pub fn hidden_microphone() -> Self {
        Self {
            subject: String::new(),
            device: Device::Microphone,
            origin: Origin::HardwareFlag,
            executable: false,
        }
    }

    /// Whether this finding has no real process behind it.
    pub fn is_hidden(&self) -> bool {
        self.origin == Origin::HardwareFlag
    }

    /// Human readable label, e.g. `Zoom (Camera)` or `[Exe] obs64.exe (Mic)`.
    pub fn label(&self) -> String {
        if self.is_hidden() {
            return "HIDDEN MIC USAGE".to_string();
        }
        let subject = if self.subject.is_empty() {
            "unknown"
        } else {
            self.subject.as_str()
        };
        if self.executable {
            format!("[Exe] {subject} ({})", self.device.tag())
        } else {
            format!("{subject} ({})", self.device.tag())
        }
    }

    fn same_target(&self, other: &Finding) -> bool {
        self.subject == other.subject && self.device == other.device
    }
}

/// Ordered, duplicate-free findings from a single poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatList {
    findings: Vec<Finding>,
}

impl ThreatList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finding unless one with the same subject and device is present.
    ///
    /// Returns whether the finding was added.
    pub fn push(&mut self, finding: Finding) -> bool {
        if self.findings.iter().any(|f| f.same_target(&finding)) {
            return false;
        }
        self.findings.push(finding);
        true
    }

    /// Append every finding from `other`, keeping first-seen order.
    pub fn extend(&mut self, other: ThreatList) {
        for finding in other.findings {
            self.push(finding);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }

    /// Whether the hidden-usage marker is present.
    pub fn has_hidden(&self) -> bool {
        self.findings.iter().any(Finding::is_hidden)
    }

    /// Labels for every finding in order.
    pub fn labels(&self) -> Vec<String> {
        self.findings.iter().map(Finding::label).collect()
    }

    /// Comma-joined labels, used for alerts and history.
    pub fn summary(&self) -> String {
        self.labels().join(", ")
    }
}

impl FromIterator<Finding> for ThreatList {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        let mut list = ThreatList::new();
        for finding in iter {
            list.push(finding);
        }
        list
    }
}

impl<'a> IntoIterator for &'a ThreatList {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}
