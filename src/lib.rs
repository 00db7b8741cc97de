//! hs-reconnect - force a running game client to reconnect
//!
//! Finds the client process by image name, blocks its outbound traffic
//! with a temporary firewall rule, waits, then removes the rule so the
//! client's own reconnect logic kicks in.

pub mod config;
pub mod commands;
pub mod privilege;
pub mod toggle;
pub mod service;

pub use config::Config;
pub use commands::{ProcessHandle, ReconnectError, ReconnectResult};
pub use toggle::{NetworkToggle, ToggleReport};
pub use service::{ReconnectOutcome, ReconnectService};
