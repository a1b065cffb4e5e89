//! Run-at-login registration.
//!
//! Only ever invoked on explicit user request. macOS gets a LaunchAgent
//! plist, Windows a value under the per-user `Run` key written through the
//! registry API.

use crate::platform::Platform;
use crate::scanner::query::NativeQuery;
use std::path::{Path, PathBuf};

const LABEL: &str = "com.shutter";

/// Per-user Run key, relative to `HKEY_CURRENT_USER`.
pub const RUN_KEY: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";

/// Value name under the Run key.
pub const RUN_VALUE: &str = "Shutter";

/// Autostart errors.
#[derive(Debug)]
pub enum AutostartError {
    Unsupported(Platform),
    NoHomeDir,
    Io(String),
    Command(String),
}

impl std::fmt::Display for AutostartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutostartError::Unsupported(p) => write!(f, "Autostart is not supported on {p}"),
            AutostartError::NoHomeDir => write!(f, "Could not determine home directory"),
            AutostartError::Io(e) => write!(f, "IO error: {e}"),
            AutostartError::Command(e) => write!(f, "Registration command failed: {e}"),
        }
    }
}

impl std::error::Error for AutostartError {}

/// LaunchAgent plist that starts `exe start` at login.
pub fn launch_agent_plist(exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{LABEL}</string>
    <key>ProgramArguments</key>
    <array><string>{}</string><string>start</string></array>
    <key>RunAtLoad</key><true/>
</dict>
</plist>
"#,
        exe.display()
    )
}

/// Where the LaunchAgent plist goes for the current user.
pub fn launch_agent_path(home: &Path) -> PathBuf {
    home.join("Library")
        .join("LaunchAgents")
        .join(format!("{LABEL}.plist"))
}

/// Command line stored under the Run key.
pub fn run_key_command(exe: &Path) -> String {
    format!("\"{}\" start", exe.display())
}

/// `REG_SZ` payload: UTF-16LE with a terminating NUL.
pub fn reg_sz_bytes(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Register `exe` to start at login. Returns a description of what was done.
pub fn install<Q: NativeQuery>(
    platform: Platform,
    exe: &Path,
    query: &Q,
) -> Result<String, AutostartError> {
    match platform {
        Platform::MacOs => {
            let home = dirs::home_dir().ok_or(AutostartError::NoHomeDir)?;
            let dest = launch_agent_path(&home);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| AutostartError::Io(e.to_string()))?;
            }
            std::fs::write(&dest, launch_agent_plist(exe))
                .map_err(|e| AutostartError::Io(e.to_string()))?;
            let dest_str = dest.to_string_lossy();
            query
                .run("launchctl", &["load", dest_str.as_ref()])
                .map_err(|e| AutostartError::Command(e.to_string()))?;
            Ok("Added to Login Items".to_string())
        }
        Platform::Windows => {
            write_run_value(&run_key_command(exe))?;
            Ok("Added to Windows Startup".to_string())
        }
        Platform::Other => Err(AutostartError::Unsupported(platform)),
    }
}

#[cfg(target_os = "windows")]
fn write_run_value(command: &str) -> Result<(), AutostartError> {
    use windows::core::HSTRING;
    use windows::Win32::Foundation::ERROR_SUCCESS;
    use windows::Win32::System::Registry::{
        RegCloseKey, RegOpenKeyExW, RegSetValueExW, HKEY, HKEY_CURRENT_USER, KEY_SET_VALUE,
        REG_SZ,
    };

    let mut key = HKEY::default();
    let status = unsafe {
        RegOpenKeyExW(
            HKEY_CURRENT_USER,
            &HSTRING::from(RUN_KEY),
            0,
            KEY_SET_VALUE,
            &mut key,
        )
    };
    if status != ERROR_SUCCESS {
        return Err(AutostartError::Command(format!("open {RUN_KEY}: {status:?}")));
    }

    let data = reg_sz_bytes(command);
    let status = unsafe {
        RegSetValueExW(
            key,
            &HSTRING::from(RUN_VALUE),
            0,
            REG_SZ,
            Some(data.as_slice()),
        )
    };
    unsafe {
        let _ = RegCloseKey(key);
    }
    if status != ERROR_SUCCESS {
        return Err(AutostartError::Command(format!("set {RUN_VALUE}: {status:?}")));
    }
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn write_run_value(_command: &str) -> Result<(), AutostartError> {
    Err(AutostartError::Unsupported(Platform::current()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::query::QueryError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingQuery {
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl NativeQuery for RecordingQuery {
        fn run(&self, program: &str, args: &[&str]) -> Result<String, QueryError> {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().map(|a| a.to_string()));
            self.calls.lock().unwrap().push(call);
            Ok(String::new())
        }
    }

    #[test]
    fn test_plist_contents() {
        let plist = launch_agent_plist(Path::new("/Applications/shutter"));
        assert!(plist.contains("<string>com.shutter</string>"));
        assert!(plist.contains("<string>/Applications/shutter</string><string>start</string>"));
        assert!(plist.contains("<key>RunAtLoad</key><true/>"));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_agent_path() {
        let path = launch_agent_path(Path::new("/Users/me"));
        assert_eq!(path, PathBuf::from("/Users/me/Library/LaunchAgents/com.shutter.plist"));
    }

    #[test]
    fn test_run_key_command_quotes_path() {
        assert_eq!(
            run_key_command(Path::new("C:\\Program Files\\shutter.exe")),
            "\"C:\\Program Files\\shutter.exe\" start"
        );
    }

    #[test]
    fn test_reg_sz_is_nul_terminated_utf16() {
        assert_eq!(reg_sz_bytes("ab"), vec![b'a', 0, b'b', 0, 0, 0]);
        assert_eq!(reg_sz_bytes(""), vec![0, 0]);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_windows_registration_needs_windows_host() {
        let query = RecordingQuery::default();
        let result = install(Platform::Windows, Path::new("C:\\shutter.exe"), &query);
        assert!(matches!(result, Err(AutostartError::Unsupported(_))));
        assert!(query.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_platform() {
        let result = install(Platform::Other, Path::new("shutter"), &RecordingQuery::default());
        assert!(matches!(result, Err(AutostartError::Unsupported(Platform::Other))));
    }
}
