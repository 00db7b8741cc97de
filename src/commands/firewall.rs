//! Windows Advanced Firewall rules driven through `netsh`

use super::{CommandOutput, CommandRunner, PrivilegedCommand};
use anyhow::Result;
use log::{debug, info};
use std::path::{Path, PathBuf};

const NETSH: &str = "netsh";

/// Traffic direction of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
}

impl Direction {
    fn as_netsh(&self) -> &'static str {
        match self {
            Direction::Outbound => "out",
        }
    }
}

/// What a rule does to matching traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Block,
}

impl RuleAction {
    fn as_netsh(&self) -> &'static str {
        match self {
            RuleAction::Block => "block",
        }
    }
}

/// A temporary per-program firewall rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub name: String,
    pub direction: Direction,
    pub action: RuleAction,
    pub target_path: PathBuf,
}

impl FirewallRule {
    /// Outbound block rule bound to one executable
    pub fn outbound_block(name: &str, target_path: &Path) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::Outbound,
            action: RuleAction::Block,
            target_path: target_path.to_path_buf(),
        }
    }

    pub fn add_command(&self) -> PrivilegedCommand {
        PrivilegedCommand::new(
            NETSH,
            [
                "advfirewall".to_string(),
                "firewall".to_string(),
                "add".to_string(),
                "rule".to_string(),
                format!("name={}", self.name),
                format!("dir={}", self.direction.as_netsh()),
                format!("action={}", self.action.as_netsh()),
                format!("program={}", self.target_path.display()),
            ],
        )
    }
}

pub fn delete_command(rule_name: &str) -> PrivilegedCommand {
    PrivilegedCommand::new(
        NETSH,
        [
            "advfirewall".to_string(),
            "firewall".to_string(),
            "delete".to_string(),
            "rule".to_string(),
            format!("name={}", rule_name),
        ],
    )
}

pub fn show_command(rule_name: &str) -> PrivilegedCommand {
    PrivilegedCommand::new(
        NETSH,
        [
            "advfirewall".to_string(),
            "firewall".to_string(),
            "show".to_string(),
            "rule".to_string(),
            format!("name={}", rule_name),
        ],
    )
}

/// Firewall front-end over a command runner
pub struct Firewall<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Firewall<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn add_rule(&self, rule: &FirewallRule) -> Result<CommandOutput> {
        debug!("Adding firewall rule {:?}", rule);
        let output = self.runner.run(&rule.add_command())?;
        if output.success() {
            info!("🔥 FIREWALL: rule \"{}\" blocks {}", rule.name, rule.target_path.display());
        }
        Ok(output)
    }

    pub fn delete_rule(&self, rule_name: &str) -> Result<CommandOutput> {
        debug!("Deleting firewall rule \"{}\"", rule_name);
        let output = self.runner.run(&delete_command(rule_name))?;
        if output.success() {
            info!("🔥 FIREWALL: rule \"{}\" removed", rule_name);
        }
        Ok(output)
    }

    /// Whether a rule with this name is present
    pub fn rule_exists(&self, rule_name: &str) -> Result<bool> {
        let output = self.runner.run(&show_command(rule_name))?;
        Ok(output.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::create_output;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedRunner {
        exit_code: i32,
        seen: Mutex<Vec<PrivilegedCommand>>,
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, command: &PrivilegedCommand) -> Result<CommandOutput> {
            self.seen.lock().unwrap().push(command.clone());
            Ok(create_output(String::new(), String::new(), Some(self.exit_code), Duration::ZERO))
        }
    }

    #[test]
    fn test_add_command_arguments() {
        let rule = FirewallRule::outbound_block(
            "BlockHSTemp",
            Path::new(r"C:\Program Files (x86)\Hearthstone\Hearthstone.exe"),
        );
        let cmd = rule.add_command();
        assert_eq!(cmd.program, "netsh");
        assert_eq!(
            cmd.args,
            vec![
                "advfirewall",
                "firewall",
                "add",
                "rule",
                "name=BlockHSTemp",
                "dir=out",
                "action=block",
                r"program=C:\Program Files (x86)\Hearthstone\Hearthstone.exe",
            ]
        );
    }

    #[test]
    fn test_delete_and_show_commands() {
        assert_eq!(
            delete_command("BlockHSTemp").args,
            vec!["advfirewall", "firewall", "delete", "rule", "name=BlockHSTemp"]
        );
        assert_eq!(show_command("BlockHSTemp").args[2], "show");
    }

    #[test]
    fn test_rule_exists_follows_exit_code() {
        let present = ScriptedRunner { exit_code: 0, seen: Mutex::new(Vec::new()) };
        assert!(Firewall::new(&present).rule_exists("BlockHSTemp").unwrap());

        let absent = ScriptedRunner { exit_code: 1, seen: Mutex::new(Vec::new()) };
        assert!(!Firewall::new(&absent).rule_exists("BlockHSTemp").unwrap());
        assert_eq!(absent.seen.lock().unwrap()[0], show_command("BlockHSTemp"));
    }
}
