//! The panic action: best-effort termination of processes using the hardware.
//!
//! Termination is advisory. Requests go out by process name through the
//! platform's kill utility and one failure never stops the rest of the batch.
//! The reported count is of requests the kill utility accepted, not of
//! processes confirmed dead.
//!
//! `pkill -f` matches the name against full command lines, so an unrelated
//! process whose arguments contain the same name is terminated too.

use crate::audit::{EventJournal, SharedMonitorStats};
use crate::config::MitigationConfig;
use crate::notify::Notifier;
use crate::platform::Platform;
use crate::scanner::query::{NativeQuery, QueryError};
use crate::scanner::types::{Device, Finding, ThreatList};
use tracing::{debug, warn};

/// Sends a terminate-by-name request.
pub trait ProcessKiller: Send + Sync {
    fn terminate(&self, name: &str) -> Result<(), QueryError>;
}

/// The command line that terminates `name` on `platform`.
pub fn terminate_command(platform: Platform, name: &str) -> (&'static str, Vec<String>) {
    match platform {
        Platform::Windows => {
            let image = if name.to_ascii_lowercase().ends_with(".exe") {
                name.to_string()
            } else {
                format!("{name}.exe")
            };
            ("taskkill", vec!["/F".to_string(), "/IM".to_string(), image])
        }
        Platform::MacOs | Platform::Other => {
            ("pkill", vec!["-f".to_string(), literal_pattern(name)])
        }
    }
}

/// Escape `name` so `pkill` matches it literally rather than as a regex.
pub fn literal_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(
            c,
            '\\' | '.' | '^' | '$' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}

/// Kills processes through the platform's command-line utility.
pub struct CommandKiller<Q: NativeQuery> {
    query: Q,
    platform: Platform,
}

impl<Q: NativeQuery> CommandKiller<Q> {
    pub fn new(query: Q, platform: Platform) -> Self {
        Self { query, platform }
    }
}

impl<Q: NativeQuery> ProcessKiller for CommandKiller<Q> {
    fn terminate(&self, name: &str) -> Result<(), QueryError> {
        let (program, args) = terminate_command(self.platform, name);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.query.run(program, &args).map(|_| ())
    }
}

/// Strip display decorations from a subject to get a process name.
///
/// Removes a leading bracketed marker such as `[Exe] ` and a trailing
/// annotation such as ` (Mic)`.
pub fn killable_name(subject: &str) -> String {
    let mut name = subject.trim();
    if name.starts_with('[') {
        if let Some(end) = name.find(']') {
            name = name[end + 1..].trim_start();
        }
    }
    if let Some(idx) = name.find(" (") {
        name = &name[..idx];
    }
    name.trim().to_string()
}

/// Outcome of a mitigation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MitigationReport {
    /// Process names a termination request went out for
    pub requested: Vec<String>,
    /// Requests that could not be dispatched, with the reason
    pub failed: Vec<(String, String)>,
    /// Findings that are never targeted (hidden usage, skip markers)
    pub skipped: usize,
}

impl MitigationReport {
    /// Requests that went out. Failed dispatches are not counted.
    pub fn issued(&self) -> usize {
        self.requested.len()
    }
}

/// Derives targets from a threat list and terminates them.
pub struct Mitigator<K: ProcessKiller> {
    killer: K,
    config: MitigationConfig,
    journal: Option<EventJournal>,
    stats: Option<SharedMonitorStats>,
}

impl<K: ProcessKiller> Mitigator<K> {
    pub fn new(killer: K, config: MitigationConfig) -> Self {
        Self {
            killer,
            config,
            journal: None,
            stats: None,
        }
    }

    /// Record kill attempts in `journal`.
    pub fn with_journal(mut self, journal: EventJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Count issued requests in `stats`.
    pub fn with_stats(mut self, stats: SharedMonitorStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// The process name to target for `finding`, if it may be killed at all.
    pub fn target_for(&self, finding: &Finding) -> Option<String> {
        if finding.is_hidden() {
            return None;
        }
        let name = killable_name(&finding.subject);
        if name.is_empty() {
            return None;
        }
        // The hardware itself, not a process.
        if finding.device == Device::Microphone && name.eq_ignore_ascii_case("Microphone") {
            return None;
        }
        let lowered_name = name.to_lowercase();
        let lowered_subject = finding.subject.to_lowercase();
        let marked = self.config.skip_markers.iter().any(|marker| {
            let marker = marker.to_lowercase();
            lowered_name.contains(&marker) || lowered_subject.contains(&marker)
        });
        if marked {
            return None;
        }
        Some(name)
    }

    /// Distinct process names to target, in threat-list order.
    pub fn plan(&self, threats: &ThreatList) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for name in threats.iter().filter_map(|f| self.target_for(f)) {
            if !targets.contains(&name) {
                targets.push(name);
            }
        }
        targets
    }

    /// Issue a termination request for every eligible finding.
    pub fn execute(&self, threats: &ThreatList) -> MitigationReport {
        let mut report = MitigationReport {
            skipped: threats.iter().filter(|f| self.target_for(f).is_none()).count(),
            ..MitigationReport::default()
        };

        for name in self.plan(threats) {
            warn!("Panic kill: {name}");
            let error = match self.killer.terminate(&name) {
                Ok(()) => None,
                Err(e) => {
                    warn!("Panic kill of {name} failed: {e}");
                    Some(e.to_string())
                }
            };
            if let Some(ref journal) = self.journal {
                if let Err(e) = journal.record_kill(&name, error.clone()) {
                    debug!("could not journal kill attempt: {e}");
                }
            }
            match error {
                None => report.requested.push(name),
                Some(reason) => report.failed.push((name, reason)),
            }
        }

        if let Some(ref stats) = self.stats {
            stats.record_kill_requests(report.issued() as u64);
        }
        report
    }

    /// The user-triggered panic action, reporting the result via `notifier`.
    pub fn panic(&self, threats: &ThreatList, notifier: &dyn Notifier) -> MitigationReport {
        if threats.is_empty() {
            notifier.notify("Shutter", "Nothing to kill.");
            return MitigationReport::default();
        }

        let report = self.execute(threats);
        notifier.notify(
            "Panic Result",
            &format!("Sent termination request to {} process(es).", report.issued()),
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::JournalRecord;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingKiller {
        killed: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl ProcessKiller for RecordingKiller {
        fn terminate(&self, name: &str) -> Result<(), QueryError> {
            self.killed.lock().unwrap().push(name.to_string());
            if self.fail_on == Some(name) {
                return Err(QueryError::Os("access denied".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
        }
    }

    fn mitigator(killer: RecordingKiller) -> Mitigator<RecordingKiller> {
        Mitigator::new(killer, MitigationConfig::default())
    }

    #[test]
    fn test_killable_name_strips_decorations() {
        assert_eq!(killable_name("[Exe] obs64.exe (Mic)"), "obs64.exe");
        assert_eq!(killable_name("Zoom (Camera)"), "Zoom");
        assert_eq!(killable_name("Google Chrome"), "Google Chrome");
        assert_eq!(killable_name(""), "");
    }

    #[test]
    fn test_terminate_commands() {
        assert_eq!(
            terminate_command(Platform::Windows, "Zoom"),
            ("taskkill", vec!["/F".to_string(), "/IM".to_string(), "Zoom.exe".to_string()])
        );
        assert_eq!(
            terminate_command(Platform::Windows, "rec.EXE").1[2],
            "rec.EXE".to_string()
        );
        assert_eq!(
            terminate_command(Platform::MacOs, "zoom.us"),
            ("pkill", vec!["-f".to_string(), "zoom\\.us".to_string()])
        );
    }

    #[test]
    fn test_literal_pattern_escapes_regex() {
        assert_eq!(literal_pattern("Discord"), "Discord");
        assert_eq!(literal_pattern("a+b (1)"), "a\\+b \\(1\\)");
        assert_eq!(literal_pattern("C:\\x"), "C:\\\\x");
    }

    #[test]
    fn test_hidden_finding_is_never_targeted() {
        let threats: ThreatList = vec![
            Finding::process("Zoom", Device::Camera),
            Finding::hidden_microphone(),
            Finding::process("Discord", Device::Microphone),
        ]
        .into_iter()
        .collect();

        let mitigator = mitigator(RecordingKiller::default());
        let report = mitigator.execute(&threats);

        assert_eq!(report.issued(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            *mitigator.killer.killed.lock().unwrap(),
            vec!["Zoom".to_string(), "Discord".to_string()]
        );
    }

    #[test]
    fn test_marked_subjects_are_skipped() {
        let threats: ThreatList = vec![
            Finding::process("HIDDEN helper", Device::Camera),
            Finding::process("Microphone", Device::Microphone),
        ]
        .into_iter()
        .collect();

        assert!(mitigator(RecordingKiller::default()).plan(&threats).is_empty());
    }

    #[test]
    fn test_same_process_on_two_devices_killed_once() {
        let threats: ThreatList = vec![
            Finding::process("Zoom", Device::Camera),
            Finding::process("Zoom", Device::Microphone),
        ]
        .into_iter()
        .collect();

        assert_eq!(mitigator(RecordingKiller::default()).plan(&threats), vec!["Zoom"]);
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let threats: ThreatList = vec![
            Finding::process("Zoom", Device::Camera),
            Finding::process("Discord", Device::Microphone),
        ]
        .into_iter()
        .collect();
        let killer = RecordingKiller {
            fail_on: Some("Zoom"),
            ..RecordingKiller::default()
        };

        let report = mitigator(killer).execute(&threats);
        assert_eq!(report.issued(), 1);
        assert_eq!(report.requested, vec!["Discord".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Zoom");
    }

    #[test]
    fn test_merged_targets_are_not_skipped() {
        let threats: ThreatList = vec![
            Finding::process("Zoom", Device::Camera),
            Finding::process("Zoom", Device::Microphone),
            Finding::hidden_microphone(),
        ]
        .into_iter()
        .collect();

        let report = mitigator(RecordingKiller::default()).execute(&threats);
        assert_eq!(report.issued(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_report_agrees_with_journal() {
        let dir = std::env::temp_dir()
            .join(format!("shutter-mitigation-{}", uuid::Uuid::new_v4()));
        let journal = EventJournal::new(dir.join("events.jsonl"));
        let threats: ThreatList = vec![
            Finding::process("Zoom", Device::Camera),
            Finding::process("Zoom", Device::Microphone),
            Finding::process("Discord", Device::Microphone),
        ]
        .into_iter()
        .collect();
        let killer = RecordingKiller {
            fail_on: Some("Zoom"),
            ..RecordingKiller::default()
        };

        let report = mitigator(killer).with_journal(journal.clone()).execute(&threats);

        let journaled_requests = journal
            .read_all()
            .unwrap()
            .into_iter()
            .filter(|record| {
                matches!(record, JournalRecord::KillAttempt { requested: true, .. })
            })
            .count();
        assert_eq!(report.issued(), 1);
        assert_eq!(journaled_requests, report.issued());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.skipped, 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_failed_panic_reports_zero_sent() {
        let notifier = RecordingNotifier::default();
        let threats: ThreatList =
            std::iter::once(Finding::process("Zoom", Device::Camera)).collect();
        let killer = RecordingKiller {
            fail_on: Some("Zoom"),
            ..RecordingKiller::default()
        };

        let report = mitigator(killer).panic(&threats, &notifier);
        assert_eq!(report.issued(), 0);
        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages[0].1, "Sent termination request to 0 process(es).");
    }

    #[test]
    fn test_panic_on_empty_list() {
        let notifier = RecordingNotifier::default();
        let report = mitigator(RecordingKiller::default()).panic(&ThreatList::new(), &notifier);

        assert_eq!(report.issued(), 0);
        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages[0].1, "Nothing to kill.");
    }

    #[test]
    fn test_panic_on_hidden_only_issues_nothing() {
        let notifier = RecordingNotifier::default();
        let threats: ThreatList = std::iter::once(Finding::hidden_microphone()).collect();
        let mitigator = mitigator(RecordingKiller::default());

        let report = mitigator.panic(&threats, &notifier);
        assert_eq!(report.issued(), 0);
        assert!(mitigator.killer.killed.lock().unwrap().is_empty());
        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages[0].0, "Panic Result");
        assert!(messages[0].1.contains('0'));
    }

    #[test]
    fn test_kill_attempts_are_journaled() {
        let dir = std::env::temp_dir()
            .join(format!("shutter-mitigation-{}", uuid::Uuid::new_v4()));
        let journal = EventJournal::new(dir.join("events.jsonl"));
        let threats: ThreatList =
            std::iter::once(Finding::process("Zoom", Device::Camera)).collect();

        let killer = RecordingKiller {
            fail_on: Some("Zoom"),
            ..RecordingKiller::default()
        };
        mitigator(killer).with_journal(journal.clone()).execute(&threats);

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }
}
