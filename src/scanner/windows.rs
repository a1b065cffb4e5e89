//! Windows detection via the capability access consent store.
//!
//! Windows records, per app and per device, when each access session started
//! and stopped. A session whose `LastUsedTimeStop` is still zero has never
//! been closed, which means the app is using the device right now.

use crate::config::DetectionConfig;
use crate::scanner::query::{run_with_timeout, QueryError};
use crate::scanner::types::{Device, Finding, ThreatList};
use crate::scanner::Scanner;
use crate::shutdown::ShutdownSignal;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Name of the registry value holding the session stop time.
pub const LAST_USED_STOP_VALUE: &str = "LastUsedTimeStop";

/// Subtree holding classic desktop applications.
const NON_PACKAGED: &str = "NonPackaged";

/// One app entry under a consent store subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentEntry {
    /// Subkey name, e.g. `Microsoft.WindowsCamera_8wekyb3d8bbwe` or
    /// `C:#Program Files#Zoom#bin#Zoom.exe`
    pub key: String,
    /// `LastUsedTimeStop`, if the value exists and is readable
    pub last_used_stop: Option<u64>,
}

impl ConsentEntry {
    /// Whether the access session is still open.
    pub fn is_active(&self) -> bool {
        self.last_used_stop == Some(0)
    }

    /// App name with package-path qualifiers removed.
    pub fn subject(&self) -> &str {
        self.key.rsplit('#').next().unwrap_or(&self.key)
    }
}

/// Injectable access to the consent store.
pub trait ConsentStore: Send + Sync {
    /// Enumerate the app entries directly under `path`.
    fn entries(&self, path: &str) -> Result<Vec<ConsentEntry>, QueryError>;
}

/// One consent store subtree to inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentTree {
    pub path: String,
    pub device: Device,
    pub non_packaged: bool,
}

/// The four subtrees: packaged and classic apps, for webcam and microphone.
pub fn consent_trees(root: &str) -> Vec<ConsentTree> {
    let mut trees = Vec::with_capacity(4);
    for (name, device) in [("webcam", Device::Camera), ("microphone", Device::Microphone)] {
        let base = format!("{root}\\{name}");
        trees.push(ConsentTree {
            path: format!("{base}\\{NON_PACKAGED}"),
            device,
            non_packaged: true,
        });
        trees.push(ConsentTree {
            path: base,
            device,
            non_packaged: false,
        });
    }
    trees
}

/// Scanner for Windows hosts.
pub struct WindowsScanner<S: ConsentStore + 'static> {
    store: Arc<S>,
    trees: Vec<ConsentTree>,
    timeout: Duration,
    signal: ShutdownSignal,
}

impl<S: ConsentStore + 'static> WindowsScanner<S> {
    pub fn new(
        store: S,
        config: &DetectionConfig,
        timeout: Duration,
        signal: ShutdownSignal,
    ) -> Self {
        Self {
            store: Arc::new(store),
            trees: consent_trees(&config.consent_store_root),
            timeout,
            signal,
        }
    }

    fn scan_tree(&self, tree: &ConsentTree) -> ThreatList {
        let store = Arc::clone(&self.store);
        let path = tree.path.clone();
        let entries = match run_with_timeout(self.timeout, &self.signal, move || {
            store.entries(&path)
        }) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("consent store query for {} failed: {e}", tree.path);
                return ThreatList::new();
            }
        };

        entries
            .iter()
            .filter(|entry| entry.is_active())
            // The packaged tree lists the NonPackaged subtree as a child.
            .filter(|entry| entry.key != NON_PACKAGED)
            .map(|entry| Finding::consent(entry.subject(), tree.device, tree.non_packaged))
            .collect()
    }
}

impl<S: ConsentStore + 'static> Scanner for WindowsScanner<S> {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn scan(&self) -> ThreatList {
        let mut threats = ThreatList::new();
        for tree in &self.trees {
            if self.signal.is_triggered() {
                break;
            }
            threats.extend(self.scan_tree(tree));
        }
        threats
    }
}

#[cfg(target_os = "windows")]
pub use registry::RegistryConsentStore;

#[cfg(target_os = "windows")]
mod registry {
    use super::{ConsentEntry, ConsentStore, LAST_USED_STOP_VALUE};
    use crate::scanner::query::QueryError;
    use windows::core::{HSTRING, PWSTR};
    use windows::Win32::Foundation::ERROR_SUCCESS;
    use windows::Win32::System::Registry::{
        RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, RegQueryValueExW, HKEY, HKEY_CURRENT_USER,
        KEY_READ,
    };

    /// Reads the consent store from `HKEY_CURRENT_USER`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RegistryConsentStore;

    /// Closes the wrapped key on drop.
    struct OpenKey(HKEY);

    impl OpenKey {
        fn open(path: &str) -> Result<Self, QueryError> {
            let mut key = HKEY::default();
            let subkey = HSTRING::from(path);
            let status =
                unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, &subkey, 0, KEY_READ, &mut key) };
            if status != ERROR_SUCCESS {
                return Err(QueryError::Os(format!("open {path}: {status:?}")));
            }
            Ok(Self(key))
        }

        fn subkey_names(&self) -> Vec<String> {
            let mut names = Vec::new();
            let mut index = 0u32;
            loop {
                let mut buf = [0u16; 512];
                let mut len = buf.len() as u32;
                let status = unsafe {
                    RegEnumKeyExW(
                        self.0,
                        index,
                        PWSTR(buf.as_mut_ptr()),
                        &mut len,
                        None,
                        PWSTR::null(),
                        None,
                        None,
                    )
                };
                if status != ERROR_SUCCESS {
                    break;
                }
                names.push(String::from_utf16_lossy(&buf[..len as usize]));
                index += 1;
            }
            names
        }

        fn read_u64(&self, value: &str) -> Option<u64> {
            let name = HSTRING::from(value);
            let mut data = [0u8; 8];
            let mut size = data.len() as u32;
            let status = unsafe {
                RegQueryValueExW(
                    self.0,
                    &name,
                    None,
                    None,
                    Some(data.as_mut_ptr()),
                    Some(&mut size as *mut u32),
                )
            };
            if status != ERROR_SUCCESS {
                return None;
            }
            let mut bytes = [0u8; 8];
            let len = (size as usize).min(8);
            bytes[..len].copy_from_slice(&data[..len]);
            Some(u64::from_le_bytes(bytes))
        }
    }

    impl Drop for OpenKey {
        fn drop(&mut self) {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }

    impl ConsentStore for RegistryConsentStore {
        fn entries(&self, path: &str) -> Result<Vec<ConsentEntry>, QueryError> {
            let parent = OpenKey::open(path)?;
            let entries = parent
                .subkey_names()
                .into_iter()
                .map(|key| {
                    let last_used_stop = OpenKey::open(&format!("{path}\\{key}"))
                        .ok()
                        .and_then(|child| child.read_u64(LAST_USED_STOP_VALUE));
                    ConsentEntry {
                        key,
                        last_used_stop,
                    }
                })
                .collect();
            Ok(entries)
        }
    }
}
