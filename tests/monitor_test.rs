//! Integration tests for the poll loop, state machine and panic action

use shutter::core::EntryKind;
use shutter::mitigation::{Mitigator, ProcessKiller};
use shutter::notify::{Indicator, Notifier};
use shutter::scanner::QueryError;
use shutter::{
    classify, Device, EventJournal, Finding, IndicatorColor, MitigationConfig, MonitorState,
    PollLoop, Scanner, StateHandle, ThreatList, Verdict,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedScanner {
    script: Mutex<VecDeque<ThreatList>>,
}

impl ScriptedScanner {
    fn new(script: Vec<ThreatList>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

impl Scanner for ScriptedScanner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn scan(&self) -> ThreatList {
        self.script.lock().unwrap().pop_front().unwrap_or_default()
    }
}

#[derive(Default)]
struct Desktop {
    notifications: Mutex<Vec<(String, String)>>,
    colors: Mutex<Vec<IndicatorColor>>,
}

impl Notifier for Desktop {
    fn notify(&self, title: &str, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

impl Indicator for Desktop {
    fn set_color(&self, color: IndicatorColor) {
        self.colors.lock().unwrap().push(color);
    }
}

#[derive(Default)]
struct RecordingKiller {
    killed: Mutex<Vec<String>>,
}

impl ProcessKiller for RecordingKiller {
    fn terminate(&self, name: &str) -> Result<(), QueryError> {
        self.killed.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

fn threats(findings: Vec<Finding>) -> ThreatList {
    findings.into_iter().collect()
}

fn run_ticks(script: Vec<ThreatList>) -> (PollLoop, Arc<Desktop>) {
    let ticks = script.len();
    let desktop = Arc::new(Desktop::default());
    let poll = PollLoop::new(
        Box::new(ScriptedScanner::new(script)),
        StateHandle::new(MonitorState::new(500)),
        desktop.clone(),
        desktop.clone(),
    );
    for _ in 0..ticks {
        poll.tick();
    }
    (poll, desktop)
}

#[test]
fn test_quiet_host_stays_safe() {
    let (poll, desktop) = run_ticks(vec![ThreatList::new(), ThreatList::new()]);
    let snapshot = poll.state().snapshot(10);

    assert_eq!(snapshot.verdict, Verdict::Safe);
    assert!(snapshot.recent_history.is_empty());
    assert!(desktop.notifications.lock().unwrap().is_empty());
    assert_eq!(
        *desktop.colors.lock().unwrap(),
        vec![IndicatorColor::Safe, IndicatorColor::Safe]
    );
}

#[test]
fn test_zoom_session_alerts_then_clears() {
    let (poll, desktop) = run_ticks(vec![
        threats(vec![Finding::process("Zoom", Device::Camera)]),
        ThreatList::new(),
    ]);
    let history = poll.state().snapshot(10).recent_history;

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, EntryKind::Alert);
    assert_eq!(history[0].transition(), "Safe -> Active");
    assert_eq!(history[1].kind, EntryKind::Clear);

    let notifications = desktop.notifications.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].1.contains("Zoom"));
}

#[test]
fn test_persisting_intrusion_alerts_once() {
    let list = threats(vec![
        Finding::process("Zoom", Device::Camera),
        Finding::process("Discord", Device::Microphone),
    ]);
    let (poll, desktop) = run_ticks(vec![list.clone(), list.clone(), list.clone(), list]);

    assert_eq!(poll.state().snapshot(10).recent_history.len(), 1);
    assert_eq!(desktop.notifications.lock().unwrap().len(), 1);
    assert_eq!(poll.state().verdict(), Verdict::Active);
}

#[test]
fn test_active_to_sketchy_recolors_without_alert() {
    let (poll, desktop) = run_ticks(vec![
        threats(vec![Finding::process("Zoom", Device::Camera)]),
        threats(vec![Finding::hidden_microphone()]),
    ]);

    assert_eq!(poll.state().verdict(), Verdict::Sketchy);
    assert_eq!(poll.state().snapshot(10).recent_history.len(), 1);
    assert_eq!(desktop.notifications.lock().unwrap().len(), 1);
    assert_eq!(
        *desktop.colors.lock().unwrap(),
        vec![IndicatorColor::Alert, IndicatorColor::Sketchy]
    );
}

#[test]
fn test_hidden_microphone_is_sketchy_and_not_killed() {
    let hidden = threats(vec![Finding::hidden_microphone()]);
    let (poll, desktop) = run_ticks(vec![hidden]);

    assert_eq!(poll.state().verdict(), Verdict::Sketchy);
    assert_eq!(desktop.notifications.lock().unwrap().len(), 1);

    let mitigator = Mitigator::new(RecordingKiller::default(), MitigationConfig::default());
    let report = mitigator.execute(&poll.state().threats());
    assert_eq!(report.issued(), 0);
}

#[test]
fn test_panic_skips_hidden_finding() {
    let list = threats(vec![
        Finding::process("Zoom", Device::Camera),
        Finding::hidden_microphone(),
        Finding::consent("obs64.exe", Device::Microphone, true),
    ]);
    assert_eq!(list.len(), 3);
    assert_eq!(classify(&list).verdict, Verdict::Sketchy);

    let desktop = Desktop::default();
    let mitigator = Mitigator::new(RecordingKiller::default(), MitigationConfig::default());
    let report = mitigator.panic(&list, &desktop);

    assert_eq!(report.issued(), 2);
    assert_eq!(report.requested, vec!["Zoom".to_string(), "obs64.exe".to_string()]);
    let notifications = desktop.notifications.lock().unwrap();
    assert_eq!(
        notifications[0].1,
        "Sent termination request to 2 process(es)."
    );
}

#[test]
fn test_duplicate_findings_collapse() {
    let list = threats(vec![
        Finding::process("Zoom", Device::Camera),
        Finding::process("Zoom", Device::Camera),
        Finding::process("Zoom", Device::Microphone),
    ]);
    assert_eq!(list.len(), 2);
}

#[test]
fn test_transitions_reach_the_journal() {
    let dir = std::env::temp_dir().join(format!("shutter-it-{}", uuid::Uuid::new_v4()));
    let journal = EventJournal::new(dir.join("events.jsonl"));
    let desktop = Arc::new(Desktop::default());
    let poll = PollLoop::new(
        Box::new(ScriptedScanner::new(vec![
            threats(vec![Finding::process("Zoom", Device::Camera)]),
            ThreatList::new(),
        ])),
        StateHandle::new(MonitorState::new(500)),
        desktop.clone(),
        desktop,
    )
    .with_journal(journal.clone());

    poll.tick();
    poll.tick();

    let entries = journal.recent_transitions(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, EntryKind::Alert);
    assert!(entries[0].summary.contains("Zoom"));
    assert_eq!(entries[1].kind, EntryKind::Clear);

    let _ = std::fs::remove_dir_all(dir);
}
