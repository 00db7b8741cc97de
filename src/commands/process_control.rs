//! Process lookup by image name
//!
//! Resolves a human-readable executable name such as `Hearthstone.exe` to a
//! live process. Uses the sysinfo crate for cross-platform enumeration.

use super::{ProcessHandle, ReconnectError, ReconnectResult};
use log::debug;
use std::path::PathBuf;
use sysinfo::{Pid, System};

/// One row of the OS process table
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub name: String,
    pub pid: u32,
    pub executable_path: Option<PathBuf>,
}

/// Source of running processes
pub trait ProcessTable: Send + Sync {
    /// Enumerate every running process once
    fn snapshot(&self) -> ReconnectResult<Vec<ProcessRecord>>;

    /// Current executable of `pid`, `None` when it is no longer running
    fn executable_path(&self, pid: u32) -> Option<PathBuf>;
}

/// Process table backed by sysinfo
pub struct SystemProcessTable;

impl SystemProcessTable {
    pub fn new() -> Self {
        SystemProcessTable
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> ReconnectResult<Vec<ProcessRecord>> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ReconnectError::ProcessTable(
                "process enumeration is not supported on this platform".to_string(),
            ));
        }

        let mut system = System::new();
        system.refresh_all();

        Ok(system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessRecord {
                name: process.name().to_string_lossy().to_string(),
                pid: pid.as_u32(),
                executable_path: process.exe().map(|p| p.to_path_buf()),
            })
            .collect())
    }

    fn executable_path(&self, pid: u32) -> Option<PathBuf> {
        let mut system = System::new();
        system.refresh_all();

        system
            .process(Pid::from_u32(pid))
            .and_then(|process| process.exe())
            .map(|p| p.to_path_buf())
    }
}

/// Find the first running process whose image name equals `name` exactly
pub fn find_process(table: &dyn ProcessTable, name: &str) -> ReconnectResult<ProcessHandle> {
    if name.is_empty() {
        return Err(ReconnectError::InvalidConfig("process name must not be empty".to_string()));
    }

    for record in table.snapshot()? {
        if record.name != name {
            continue;
        }
        debug!("process {} found. PID: {}", name, record.pid);

        return match record.executable_path {
            Some(executable_path) if !executable_path.as_os_str().is_empty() => Ok(ProcessHandle {
                name: record.name,
                pid: record.pid,
                executable_path,
            }),
            _ => Err(ReconnectError::ExecutablePathUnavailable {
                name: record.name,
                pid: record.pid,
            }),
        };
    }

    Err(ReconnectError::ProcessNotFound { name: name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticTable(Vec<ProcessRecord>);

    impl ProcessTable for StaticTable {
        fn snapshot(&self) -> ReconnectResult<Vec<ProcessRecord>> {
            Ok(self.0.clone())
        }

        fn executable_path(&self, pid: u32) -> Option<PathBuf> {
            self.0.iter().find(|r| r.pid == pid).and_then(|r| r.executable_path.clone())
        }
    }

    struct DeniedTable;

    impl ProcessTable for DeniedTable {
        fn snapshot(&self) -> ReconnectResult<Vec<ProcessRecord>> {
            Err(ReconnectError::ProcessTable("access denied".to_string()))
        }

        fn executable_path(&self, _pid: u32) -> Option<PathBuf> {
            None
        }
    }

    fn record(name: &str, pid: u32, path: Option<&str>) -> ProcessRecord {
        ProcessRecord {
            name: name.to_string(),
            pid,
            executable_path: path.map(PathBuf::from),
        }
    }

    #[test]
    fn test_empty_table_is_not_found() {
        let err = find_process(&StaticTable(vec![]), "Hearthstone.exe").unwrap_err();
        assert_eq!(err, ReconnectError::ProcessNotFound { name: "Hearthstone.exe".to_string() });
    }

    #[test]
    fn test_single_match_carries_path() {
        let table = StaticTable(vec![
            record("explorer.exe", 7, Some("/windows/explorer.exe")),
            record("Hearthstone.exe", 42, Some("/games/hs.exe")),
        ]);
        let handle = find_process(&table, "Hearthstone.exe").unwrap();
        assert_eq!(handle.pid, 42);
        assert_eq!(handle.name, "Hearthstone.exe");
        assert_eq!(handle.executable_path, PathBuf::from("/games/hs.exe"));
    }

    #[test]
    fn test_match_is_exact() {
        let table = StaticTable(vec![
            record("Hearthstone.exe.bak", 1, Some("/a")),
            record("Hearthstone", 2, Some("/b")),
        ]);
        assert!(matches!(
            find_process(&table, "Hearthstone.exe"),
            Err(ReconnectError::ProcessNotFound { .. })
        ));
    }

    #[test]
    fn test_first_match_wins() {
        let table = StaticTable(vec![
            record("Hearthstone.exe", 10, Some("/first")),
            record("Hearthstone.exe", 11, Some("/second")),
        ]);
        assert_eq!(find_process(&table, "Hearthstone.exe").unwrap().pid, 10);
    }

    #[test]
    fn test_unreadable_path_is_distinct_from_not_found() {
        let table = StaticTable(vec![record("Hearthstone.exe", 42, None)]);
        assert_eq!(
            find_process(&table, "Hearthstone.exe").unwrap_err(),
            ReconnectError::ExecutablePathUnavailable { name: "Hearthstone.exe".to_string(), pid: 42 }
        );
    }

    #[test]
    fn test_enumeration_failure_is_not_not_found() {
        let err = find_process(&DeniedTable, "Hearthstone.exe").unwrap_err();
        assert_eq!(err, ReconnectError::ProcessTable("access denied".to_string()));
        assert!(!matches!(err, ReconnectError::ProcessNotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            find_process(&StaticTable(vec![]), ""),
            Err(ReconnectError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_system_table_sees_current_process() {
        let table = SystemProcessTable::new();
        let records = table.snapshot().unwrap();
        let me = std::process::id();
        assert!(records.iter().any(|r| r.pid == me));
        assert!(table.executable_path(me).is_some());
    }
}
