//! `plugsw` - Plug Switcher
//!
//! Keeps a preferred audio output and input as the system default while USB
//! audio hardware comes and goes. A daemon watches udev hotplug events and,
//! after each one, re-lists devices through `pactl` and restores the user's
//! preferred devices by description.
//!
//! # Features
//! - One reconciliation pass per hotplug event, self-healing if events are lost
//! - Preferences persisted in a small JSON file, edited via CLI or IPC
//! - Monitoring can be paused without stopping the daemon
//! - Desktop notifications for switches and failures
//! - systemd user service support (sd_notify readiness)

pub mod cli;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod daemon_manager;
pub mod engine;
pub mod hotplug;
pub mod ipc;
pub mod logging;
pub mod notification;
pub mod preferences;
pub mod pulse;
pub mod style;
pub mod view;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types for convenience
pub use cli::Args;
pub use config::Config;
pub use engine::{Engine, PassReport};
pub use preferences::{PersistedState, PreferenceStore};
pub use pulse::{AudioGateway, DeviceDescriptor, Role};
pub use view::{DaemonView, Presenter};
