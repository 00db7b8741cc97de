//! Network toggle controller
//!
//! Drives one block -> wait -> unblock cycle for a single process:
//!
//! ```text
//! IDLE -> ELEVATING -> BLOCKED -> WAITING -> UNBLOCKED
//! ```
//!
//! The cycle is strictly sequential and never retried. Once the block rule
//! is in place the cycle always runs through the delete attempt; a failed
//! delete is reported as a leaked rule.

use crate::commands::firewall::{Firewall, FirewallRule};
use crate::commands::process_control::{find_process, ProcessTable};
use crate::commands::{CommandRunner, ProcessHandle, ReconnectError, ReconnectResult};
use crate::privilege::{ElevationStatus, PrivilegeCheck};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Summary of a completed cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToggleReport {
    pub rule_name: String,
    pub pid: u32,
    pub executable_path: PathBuf,
    pub requested_block_ms: u64,
    pub actual_block_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct NetworkToggle {
    runner: Box<dyn CommandRunner>,
    privilege: Box<dyn PrivilegeCheck>,
    processes: Box<dyn ProcessTable>,
}

impl NetworkToggle {
    pub fn new(
        runner: Box<dyn CommandRunner>,
        privilege: Box<dyn PrivilegeCheck>,
        processes: Box<dyn ProcessTable>,
    ) -> Self {
        Self { runner, privilege, processes }
    }

    /// Controller wired to the real process table, `netsh` and token check
    pub fn system() -> Self {
        Self::new(
            Box::new(crate::commands::executor::SystemCommandRunner::new()),
            Box::new(crate::privilege::SystemPrivilege::new()),
            Box::new(crate::commands::process_control::SystemProcessTable::new()),
        )
    }

    pub fn find_process(&self, name: &str) -> ReconnectResult<ProcessHandle> {
        find_process(self.processes.as_ref(), name)
    }

    pub fn elevation_status(&self) -> ElevationStatus {
        self.privilege.status()
    }

    /// Block outbound traffic of `process` for `block_duration`, then unblock
    pub fn toggle_network(
        &self,
        process: &ProcessHandle,
        rule_name: &str,
        block_duration: Duration,
    ) -> ReconnectResult<ToggleReport> {
        if rule_name.is_empty() {
            return Err(ReconnectError::InvalidConfig("rule name must not be empty".to_string()));
        }
        let started_at = Utc::now();

        debug!("Toggle state IDLE -> ELEVATING");
        self.ensure_elevated()?;

        if let Err(diagnostic) = self.confirm_alive(process) {
            error!("Not blocking {}: {}", process.name, diagnostic);
            return Err(ReconnectError::RuleCreation {
                rule: rule_name.to_string(),
                diagnostic,
            });
        }

        let firewall = Firewall::new(self.runner.as_ref());
        let rule = FirewallRule::outbound_block(rule_name, &process.executable_path);
        let added = firewall.add_rule(&rule).map_err(|e| format!("{:#}", e)).and_then(|output| {
            if output.success() { Ok(()) } else { Err(output.diagnostic()) }
        });
        if let Err(diagnostic) = added {
            error!("Failed to block {}: {}", process.name, diagnostic);
            return Err(ReconnectError::RuleCreation {
                rule: rule_name.to_string(),
                diagnostic,
            });
        }
        debug!("Toggle state ELEVATING -> BLOCKED");
        info!("Process {} network connection blocked.", process.name);

        debug!("Toggle state BLOCKED -> WAITING ({:?})", block_duration);
        let blocked_since = Instant::now();
        std::thread::sleep(block_duration);

        let deleted = firewall.delete_rule(rule_name).map_err(|e| format!("{:#}", e)).and_then(|output| {
            if output.success() { Ok(()) } else { Err(output.diagnostic()) }
        });
        let actual_block = blocked_since.elapsed();
        if let Err(diagnostic) = deleted {
            error!(
                "⚠️ Firewall rule \"{}\" could not be removed and still blocks {}: {}",
                rule_name,
                process.executable_path.display(),
                diagnostic
            );
            error!("⚠️ Remove it manually: netsh advfirewall firewall delete rule name=\"{}\"", rule_name);
            return Err(ReconnectError::RuleDeletion {
                rule: rule_name.to_string(),
                diagnostic,
            });
        }
        debug!("Toggle state WAITING -> UNBLOCKED");
        info!("Process {} network connection unblocked.", process.name);

        Ok(ToggleReport {
            rule_name: rule_name.to_string(),
            pid: process.pid,
            executable_path: process.executable_path.clone(),
            requested_block_ms: block_duration.as_millis() as u64,
            actual_block_ms: actual_block.as_millis() as u64,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Delete a rule left behind by a failed cycle.
    ///
    /// Returns `false` when no rule with that name exists.
    pub fn cleanup_rule(&self, rule_name: &str) -> ReconnectResult<bool> {
        self.ensure_elevated()?;

        let firewall = Firewall::new(self.runner.as_ref());
        let exists = firewall.rule_exists(rule_name).map_err(|e| ReconnectError::RuleDeletion {
            rule: rule_name.to_string(),
            diagnostic: format!("{:#}", e),
        })?;
        if !exists {
            info!("No firewall rule named \"{}\" to clean up", rule_name);
            return Ok(false);
        }

        let output = firewall.delete_rule(rule_name).map_err(|e| ReconnectError::RuleDeletion {
            rule: rule_name.to_string(),
            diagnostic: format!("{:#}", e),
        })?;
        if !output.success() {
            return Err(ReconnectError::RuleDeletion {
                rule: rule_name.to_string(),
                diagnostic: output.diagnostic(),
            });
        }
        Ok(true)
    }

    /// Whether a rule with this name is currently installed
    pub fn rule_exists(&self, rule_name: &str) -> anyhow::Result<bool> {
        Firewall::new(self.runner.as_ref()).rule_exists(rule_name)
    }

    fn ensure_elevated(&self) -> ReconnectResult<()> {
        let status = self.privilege.status();
        if !status.is_elevated {
            error!("Administrator privileges required: {}", status.detail);
            return Err(ReconnectError::InsufficientPrivilege(status.detail));
        }
        Ok(())
    }

    fn confirm_alive(&self, process: &ProcessHandle) -> Result<(), String> {
        match self.processes.executable_path(process.pid) {
            Some(path) if path == process.executable_path => Ok(()),
            Some(path) => Err(format!(
                "process {} now runs {} instead of {}",
                process.pid,
                path.display(),
                process.executable_path.display()
            )),
            None => Err(format!("process {} is no longer running", process.pid)),
        }
    }
}
