//! Privileged command execution for the reconnect cycle
//!
//! This module owns everything that leaves the process: enumerating the OS
//! process table, running `netsh` against the Windows firewall, and the
//! error taxonomy every caller branches on.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use log::{debug, info};

pub mod executor;
pub mod firewall;
pub mod process_control;

/// A single external command, kept as discrete argv entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegedCommand {
    /// Program to execute
    pub program: String,

    /// Arguments passed verbatim, never through a shell
    pub args: Vec<String>,
}

impl PrivilegedCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Human-readable form for logs
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of a finished command
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Diagnostic text for error messages.
    ///
    /// `netsh` prints its failures on stdout, so stdout is used when stderr
    /// is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated without exit code".to_string(),
        }
    }
}

/// Runs privileged commands on behalf of the firewall controller
pub trait CommandRunner: Send + Sync {
    /// Execute the command and capture its output.
    ///
    /// An `Err` means the command could not be started at all; a command
    /// that ran and failed is an `Ok` with a non-zero exit code.
    fn run(&self, command: &PrivilegedCommand) -> Result<CommandOutput>;
}

/// Failures of a reconnect cycle
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconnectError {
    #[error("Process with name [{name}] not found")]
    ProcessNotFound { name: String },

    #[error("Failed to enumerate processes: {0}")]
    ProcessTable(String),

    #[error("Executable path of process {name} (PID {pid}) is not readable")]
    ExecutablePathUnavailable { name: String, pid: u32 },

    #[error("Administrator privileges required: {0}")]
    InsufficientPrivilege(String),

    #[error("Failed to add firewall rule \"{rule}\": {diagnostic}")]
    RuleCreation { rule: String, diagnostic: String },

    #[error("Failed to delete firewall rule \"{rule}\": {diagnostic}. The rule is still blocking traffic and must be removed manually")]
    RuleDeletion { rule: String, diagnostic: String },

    #[error("A reconnect is already in progress")]
    AlreadyInProgress,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReconnectError {
    /// The firewall rule left behind, if this failure leaked one
    pub fn leaked_rule(&self) -> Option<&str> {
        match self {
            ReconnectError::RuleDeletion { rule, .. } => Some(rule),
            _ => None,
        }
    }

    pub fn is_leak(&self) -> bool {
        self.leaked_rule().is_some()
    }

    /// Whether the whole operation can simply be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconnectError::ProcessNotFound { .. }
                | ReconnectError::RuleCreation { .. }
                | ReconnectError::AlreadyInProgress
        )
    }
}

/// Result type for reconnect operations
pub type ReconnectResult<T> = std::result::Result<T, ReconnectError>;

/// Live process as seen in one scan of the process table
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProcessHandle {
    /// Image name as matched
    pub name: String,

    /// OS process identifier
    pub pid: u32,

    /// Absolute path to the running binary at scan time
    pub executable_path: PathBuf,
}

/// Log a command before it is executed
pub fn log_command_execution(command: &PrivilegedCommand) {
    info!("Executing privileged command: {}", command.program);
    debug!("Privileged command line: {}", command.display());
}

/// Build a `CommandOutput` from raw process results
pub fn create_output(
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    execution_time: Duration,
) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout,
        stderr,
        execution_time_ms: execution_time.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let output = create_output(
            "stdout text".to_string(),
            "stderr text\n".to_string(),
            Some(1),
            Duration::from_millis(5),
        );
        assert!(!output.success());
        assert_eq!(output.diagnostic(), "stderr text");
    }

    #[test]
    fn test_diagnostic_falls_back_to_stdout() {
        let output = create_output(
            "No rules match the specified criteria.\r\n".to_string(),
            String::new(),
            Some(1),
            Duration::from_millis(5),
        );
        assert_eq!(output.diagnostic(), "No rules match the specified criteria.");
    }

    #[test]
    fn test_diagnostic_with_no_output() {
        let output = create_output(String::new(), String::new(), Some(3), Duration::ZERO);
        assert_eq!(output.diagnostic(), "exit code 3");

        let killed = create_output(String::new(), String::new(), None, Duration::ZERO);
        assert!(!killed.success());
        assert_eq!(killed.diagnostic(), "terminated without exit code");
    }

    #[test]
    fn test_error_classification() {
        let leak = ReconnectError::RuleDeletion {
            rule: "BlockHSTemp".to_string(),
            diagnostic: "boom".to_string(),
        };
        assert!(leak.is_leak());
        assert_eq!(leak.leaked_rule(), Some("BlockHSTemp"));
        assert!(!leak.is_retryable());

        let create = ReconnectError::RuleCreation {
            rule: "BlockHSTemp".to_string(),
            diagnostic: "boom".to_string(),
        };
        assert!(!create.is_leak());
        assert!(create.is_retryable());
        assert_ne!(create.to_string(), leak.to_string());

        let missing = ReconnectError::ProcessNotFound { name: "Hearthstone.exe".to_string() };
        assert!(missing.is_retryable());
        assert!(missing.to_string().contains("[Hearthstone.exe]"));

        assert!(!ReconnectError::InsufficientPrivilege("not elevated".to_string()).is_retryable());
    }

    #[test]
    fn test_command_display() {
        let cmd = PrivilegedCommand::new("netsh", ["advfirewall", "firewall", "show", "rule", "name=X"]);
        assert_eq!(cmd.display(), "netsh advfirewall firewall show rule name=X");
    }
}
