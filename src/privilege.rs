//! Administrator privilege detection
//!
//! Firewall mutation requires an elevated token on Windows and root on Unix.
//! The check runs once per cycle, before the first firewall command.

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};

/// Elevation state of the current process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElevationStatus {
    pub is_elevated: bool,

    /// Short description of how the state was determined
    pub detail: String,

    /// Steps for the operator when elevation is missing
    pub guidance: Vec<String>,
}

impl ElevationStatus {
    pub fn elevated(detail: &str) -> Self {
        Self {
            is_elevated: true,
            detail: detail.to_string(),
            guidance: Vec::new(),
        }
    }

    pub fn not_elevated(detail: &str) -> Self {
        Self {
            is_elevated: false,
            detail: detail.to_string(),
            guidance: elevation_guidance(),
        }
    }
}

/// Source of elevation state
pub trait PrivilegeCheck: Send + Sync {
    fn status(&self) -> ElevationStatus;
}

/// Checks the token of the running process
pub struct SystemPrivilege;

impl SystemPrivilege {
    pub fn new() -> Self {
        SystemPrivilege
    }
}

impl Default for SystemPrivilege {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeCheck for SystemPrivilege {
    fn status(&self) -> ElevationStatus {
        match current_process_elevated() {
            Ok(true) => ElevationStatus::elevated(ELEVATED_DETAIL),
            Ok(false) => ElevationStatus::not_elevated(LIMITED_DETAIL),
            Err(e) => {
                debug!("Elevation query failed: {}", e);
                ElevationStatus::not_elevated(&format!("unable to query elevation: {}", e))
            }
        }
    }
}

#[cfg(target_os = "windows")]
const ELEVATED_DETAIL: &str = "process token is elevated";
#[cfg(target_os = "windows")]
const LIMITED_DETAIL: &str = "process token is not elevated (UAC limited token)";

#[cfg(not(target_os = "windows"))]
const ELEVATED_DETAIL: &str = "effective user is root";
#[cfg(not(target_os = "windows"))]
const LIMITED_DETAIL: &str = "effective user is not root";

#[cfg(target_os = "windows")]
fn current_process_elevated() -> Result<bool> {
    use anyhow::anyhow;
    use std::mem;
    use std::ptr;
    use winapi::shared::minwindef::DWORD;
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcessToken};
    use winapi::um::securitybaseapi::GetTokenInformation;
    use winapi::um::winnt::{TokenElevation, HANDLE, TOKEN_ELEVATION, TOKEN_QUERY};

    unsafe {
        let mut token: HANDLE = ptr::null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
            return Err(anyhow!("OpenProcessToken failed: {}", std::io::Error::last_os_error()));
        }

        let mut elevation: TOKEN_ELEVATION = mem::zeroed();
        let mut returned: DWORD = 0;
        let ok = GetTokenInformation(
            token,
            TokenElevation,
            &mut elevation as *mut TOKEN_ELEVATION as *mut _,
            mem::size_of::<TOKEN_ELEVATION>() as DWORD,
            &mut returned,
        );
        let query_error = std::io::Error::last_os_error();
        CloseHandle(token);

        if ok == 0 {
            return Err(anyhow!("GetTokenInformation failed: {}", query_error));
        }
        Ok(elevation.TokenIsElevated != 0)
    }
}

#[cfg(unix)]
fn current_process_elevated() -> Result<bool> {
    Ok(nix::unistd::geteuid().is_root())
}

#[cfg(not(any(unix, target_os = "windows")))]
fn current_process_elevated() -> Result<bool> {
    Err(anyhow::anyhow!("elevation detection is not supported on this platform"))
}

/// Operator instructions for re-launching with elevation
pub fn elevation_guidance() -> Vec<String> {
    if cfg!(target_os = "windows") {
        vec![
            "Close hs-reconnect.".to_string(),
            "Right-click the terminal (or hs-reconnect.exe) and choose \"Run as administrator\".".to_string(),
            "Accept the UAC prompt, then run hs-reconnect again.".to_string(),
        ]
    } else {
        vec!["Re-run hs-reconnect with sudo or as root.".to_string()]
    }
}
