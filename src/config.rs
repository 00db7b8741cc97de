//! Configuration management for hs-reconnect
//!
//! Settings come from defaults, an optional `.env` file and the process
//! environment, in increasing priority. Command-line flags are applied on
//! top by the binary. The resulting value is passed explicitly into the
//! service; nothing below reads the environment again.

use crate::commands::{ReconnectError, ReconnectResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

pub const ENV_EXEC_NAME: &str = "EXEC_NAME";
pub const ENV_RULE_NAME: &str = "NEW_RULE_NAME";
pub const ENV_BLOCK_DURATION: &str = "SLEEP_INTERVAL";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Image name of the process to reconnect
    pub exec_name: String,

    /// Name of the temporary firewall rule
    pub rule_name: String,

    /// How long outbound traffic stays blocked (in seconds)
    pub block_duration_secs: f64,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exec_name: "Hearthstone.exe".to_string(),
            rule_name: "BlockHearthstoneTemp".to_string(),
            block_duration_secs: 2.0,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `.env` in the working directory (if any) and the environment
    pub fn load() -> Result<Self> {
        // A missing .env is normal; environment and defaults still apply
        let _ = dotenv::dotenv();
        Ok(Self::from_lookup(|key| env::var(key).ok())?)
    }

    /// Load from a specific env file, then the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        dotenv::from_path(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Ok(Self::from_lookup(|key| env::var(key).ok())?)
    }

    /// Build from defaults overridden by whatever `lookup` returns
    pub fn from_lookup<F>(lookup: F) -> ReconnectResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_EXEC_NAME) {
            config.exec_name = value;
        }
        if let Some(value) = lookup(ENV_RULE_NAME) {
            config.rule_name = value;
        }
        if let Some(value) = lookup(ENV_BLOCK_DURATION) {
            config.block_duration_secs = parse_duration_secs(&value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            config.log_level = value;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReconnectResult<()> {
        if self.exec_name.trim().is_empty() {
            return Err(ReconnectError::InvalidConfig("executable name must not be empty".to_string()));
        }
        if self.rule_name.trim().is_empty() {
            return Err(ReconnectError::InvalidConfig("rule name must not be empty".to_string()));
        }
        check_duration_secs(self.block_duration_secs, &self.block_duration_secs.to_string())?;
        Ok(())
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_duration_secs)
    }
}

/// Parse a duration in (fractional) seconds
pub fn parse_duration_secs(value: &str) -> ReconnectResult<f64> {
    let secs = value.trim().parse::<f64>().map_err(|_| {
        ReconnectError::InvalidConfig(format!("invalid block duration \"{}\"", value))
    })?;
    check_duration_secs(secs, value)?;
    Ok(secs)
}

/// Accept only values `Duration` can represent
fn check_duration_secs(secs: f64, shown: &str) -> ReconnectResult<()> {
    if Duration::try_from_secs_f64(secs).is_err() {
        return Err(ReconnectError::InvalidConfig(format!(
            "block duration must be a non-negative number of seconds, got {}",
            shown
        )));
    }
    Ok(())
}
