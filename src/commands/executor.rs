//! Executor that runs privileged commands through the OS

use super::{CommandOutput, CommandRunner, PrivilegedCommand, create_output, log_command_execution};
use anyhow::{Result, Context};
use log::debug;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Runs commands directly, without an intermediate shell
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        SystemCommandRunner
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &PrivilegedCommand) -> Result<CommandOutput> {
        log_command_execution(command);
        let start_time = Instant::now();

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute {}", command.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();

        debug!("Command completed with exit code: {:?}", exit_code);
        debug!("Stdout length: {} bytes", stdout.len());
        debug!("Stderr length: {} bytes", stderr.len());

        Ok(create_output(stdout, stderr, exit_code, start_time.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_an_error() {
        let runner = SystemCommandRunner::new();
        let cmd = PrivilegedCommand::new("hs-reconnect-no-such-binary", Vec::<String>::new());
        let err = runner.run(&cmd).unwrap_err();
        assert!(err.to_string().contains("hs-reconnect-no-such-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_exit_code_and_output() {
        let runner = SystemCommandRunner::new();

        let ok = runner.run(&PrivilegedCommand::new("sh", ["-c", "echo added"])).unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "added");

        let failed = runner
            .run(&PrivilegedCommand::new("sh", ["-c", "echo denied 1>&2; exit 5"]))
            .unwrap();
        assert!(!failed.success());
        assert_eq!(failed.exit_code, Some(5));
        assert_eq!(failed.diagnostic(), "denied");
    }

    #[cfg(unix)]
    #[test]
    fn test_arguments_are_not_shell_expanded() {
        let runner = SystemCommandRunner::new();
        let output = runner
            .run(&PrivilegedCommand::new("echo", ["name=Block HS; rm -rf /"]))
            .unwrap();
        assert_eq!(output.stdout.trim(), "name=Block HS; rm -rf /");
    }
}
