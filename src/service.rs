//! Reconnect service: runs cycles off the caller's thread
//!
//! The toggle controller blocks for the whole cycle. The service moves each
//! cycle onto tokio's blocking pool and refuses a second trigger while one
//! is still in flight.

use crate::commands::{ProcessHandle, ReconnectError, ReconnectResult};
use crate::privilege::ElevationStatus;
use crate::toggle::{NetworkToggle, ToggleReport};
use crate::Config;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Completion signal handed back to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectOutcome {
    pub success: bool,

    /// Error message when the cycle failed
    pub message: Option<String>,

    /// Rule that is still installed and needs manual removal
    pub leaked_rule: Option<String>,

    pub report: Option<ToggleReport>,
}

impl ReconnectOutcome {
    pub fn from_result(result: ReconnectResult<ToggleReport>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                message: None,
                leaked_rule: None,
                report: Some(report),
            },
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn from_error(error: &ReconnectError) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
            leaked_rule: error.leaked_rule().map(str::to_string),
            report: None,
        }
    }
}

/// Result of a read-only environment check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub elevation: ElevationStatus,
    pub process: Option<ProcessHandle>,
    pub process_error: Option<String>,
    pub rule_present: Option<bool>,
    pub rule_error: Option<String>,
}

/// Clears the in-flight flag on every exit path of a task
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ReconnectService {
    config: Config,
    toggle: Arc<NetworkToggle>,
    reconnecting: Arc<AtomicBool>,
}

impl ReconnectService {
    pub fn new(config: Config, toggle: NetworkToggle) -> Self {
        Self {
            config,
            toggle: Arc::new(toggle),
            reconnecting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    /// Start one locate + toggle cycle on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self) -> ReconnectResult<JoinHandle<ReconnectOutcome>> {
        let guard = self.acquire()?;
        let toggle = Arc::clone(&self.toggle);
        let config = self.config.clone();
        debug!("Reconnecting");

        Ok(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let outcome = ReconnectOutcome::from_result(run_cycle(&toggle, &config));
            if outcome.success {
                info!("✅ Reconnection finished");
            } else if let Some(rule) = &outcome.leaked_rule {
                error!("⚠️ Reconnection left firewall rule \"{}\" in place; manual cleanup required", rule);
            } else {
                warn!("Reconnection error: {}", outcome.message.as_deref().unwrap_or("unknown"));
            }
            outcome
        }))
    }

    /// Run one cycle and wait for its outcome
    pub async fn reconnect(&self) -> ReconnectOutcome {
        match self.trigger() {
            Ok(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Reconnect task failed: {}", e);
                    ReconnectOutcome {
                        success: false,
                        message: Some(format!("Reconnect task failed: {}", e)),
                        leaked_rule: None,
                        report: None,
                    }
                }
            },
            Err(e) => ReconnectOutcome::from_error(&e),
        }
    }

    /// Remove a rule leaked by an earlier cycle
    pub async fn cleanup_rule(&self) -> ReconnectResult<bool> {
        let guard = self.acquire()?;
        let toggle = Arc::clone(&self.toggle);
        let rule_name = self.config.rule_name.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            toggle.cleanup_rule(&rule_name)
        })
        .await;

        joined.unwrap_or_else(|e| {
            Err(ReconnectError::RuleDeletion {
                rule: self.config.rule_name.clone(),
                diagnostic: format!("cleanup task failed: {}", e),
            })
        })
    }

    /// Report elevation, target process and rule presence without changing anything
    pub fn diagnose(&self) -> Diagnosis {
        let elevation = self.toggle.elevation_status();

        let (process, process_error) = match self.toggle.find_process(&self.config.exec_name) {
            Ok(handle) => (Some(handle), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let (rule_present, rule_error) = match self.toggle.rule_exists(&self.config.rule_name) {
            Ok(present) => (Some(present), None),
            Err(e) => (None, Some(format!("{:#}", e))),
        };

        Diagnosis {
            elevation,
            process,
            process_error,
            rule_present,
            rule_error,
        }
    }

    fn acquire(&self) -> ReconnectResult<InFlight> {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Already reconnecting");
            return Err(ReconnectError::AlreadyInProgress);
        }
        Ok(InFlight(Arc::clone(&self.reconnecting)))
    }
}

/// Locate the configured process and run one toggle cycle on it
pub fn run_cycle(toggle: &NetworkToggle, config: &Config) -> ReconnectResult<ToggleReport> {
    config.validate()?;
    let process = toggle.find_process(&config.exec_name)?;
    toggle.toggle_network(&process, &config.rule_name, config.block_duration())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_leak() {
        let outcome = ReconnectOutcome::from_error(&ReconnectError::RuleDeletion {
            rule: "BlockHSTemp".to_string(),
            diagnostic: "access denied".to_string(),
        });
        assert!(!outcome.success);
        assert_eq!(outcome.leaked_rule.as_deref(), Some("BlockHSTemp"));
        assert!(outcome.message.unwrap().contains("access denied"));
    }

    #[test]
    fn test_outcome_from_not_found() {
        let outcome = ReconnectOutcome::from_result(Err(ReconnectError::ProcessNotFound {
            name: "Hearthstone.exe".to_string(),
        }));
        assert!(!outcome.success);
        assert!(outcome.leaked_rule.is_none());
        assert!(outcome.report.is_none());
    }

    #[test]
    fn test_in_flight_guard_resets_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        drop(InFlight(Arc::clone(&flag)));
        assert!(!flag.load(Ordering::SeqCst));
    }
}
