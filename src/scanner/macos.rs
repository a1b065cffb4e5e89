//! macOS detection via the open-file table and the audio engine registry.
//!
//! Camera use shows up as CoreMediaIO handles in `lsof`. Microphone use is
//! confirmed first through the HDA input engine state in `ioreg`; only when
//! the hardware is hot do we look for CoreAudio handles, and if none survive
//! the daemon allow-list the usage is reported as hidden.

use crate::config::DetectionConfig;
use crate::scanner::query::NativeQuery;
use crate::scanner::types::{Device, Finding, ThreatList};
use crate::scanner::Scanner;
use tracing::debug;

const LSOF: &str = "lsof";
const LSOF_ARGS: &[&str] = &["-n", "-P"];
const IOREG: &str = "ioreg";

/// Scanner for macOS hosts.
pub struct MacScanner<Q: NativeQuery> {
    query: Q,
    config: DetectionConfig,
}

impl<Q: NativeQuery> MacScanner<Q> {
    pub fn new(query: Q, config: DetectionConfig) -> Self {
        Self { query, config }
    }

    /// Processes holding camera handles, minus the OS vendor's own services.
    fn scan_camera(&self) -> ThreatList {
        let out = match self.query.run(LSOF, LSOF_ARGS) {
            Ok(out) => out,
            Err(e) => {
                debug!("camera handle query failed: {e}");
                return ThreatList::new();
            }
        };

        handle_owners(&out, &self.config.camera_handle_marker)
            .into_iter()
            .filter(|name| !name.contains(&self.config.vendor_prefix))
            .map(|name| Finding::process(name, Device::Camera))
            .collect()
    }

    /// Whether the audio input engine reports itself running.
    fn microphone_engaged(&self) -> bool {
        let class = self.config.audio_engine_class.as_str();
        match self.query.run(IOREG, &["-c", class, "-r"]) {
            Ok(out) => out.contains(&self.config.engine_active_marker),
            Err(e) => {
                debug!("audio engine query failed: {e}");
                false
            }
        }
    }

    /// Processes holding audio handles, minus allow-listed system daemons.
    fn scan_microphone(&self) -> ThreatList {
        let out = match self.query.run(LSOF, LSOF_ARGS) {
            Ok(out) => out,
            Err(e) => {
                debug!("audio handle query failed: {e}");
                return ThreatList::new();
            }
        };

        handle_owners(&out, &self.config.audio_handle_marker)
            .into_iter()
            .filter(|name| !self.is_allowlisted(name))
            .map(|name| Finding::process(name, Device::Microphone))
            .collect()
    }

    fn is_allowlisted(&self, name: &str) -> bool {
        self.config
            .audio_daemon_allowlist
            .iter()
            .any(|daemon| name.contains(daemon.as_str()))
    }
}

impl<Q: NativeQuery> Scanner for MacScanner<Q> {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn scan(&self) -> ThreatList {
        let mut threats = self.scan_camera();

        if self.microphone_engaged() {
            let microphone = self.scan_microphone();
            if microphone.is_empty() {
                // Hardware is hot but nobody owns it.
                threats.push(Finding::hidden_microphone());
            } else {
                threats.extend(microphone);
            }
        }

        threats
    }
}

/// Command names of every `lsof` line mentioning `marker`, in first-seen order.
pub fn handle_owners(lsof_output: &str, marker: &str) -> Vec<String> {
    let mut owners: Vec<String> = Vec::new();
    for line in lsof_output.lines().filter(|l| l.contains(marker)) {
        let Some(command) = line.split_whitespace().next() else {
            continue;
        };
        let name = decode_command_name(command);
        if !owners.contains(&name) {
            owners.push(name);
        }
    }
    owners
}

/// Undo lsof's escaping of spaces in the COMMAND column.
fn decode_command_name(raw: &str) -> String {
    raw.replace("\\x20", " ").replace('_', " ")
}
