//! Worklog sync CLI library.
//!
//! Wires the pure worklog model in `wl-core` to the remote collaborators in
//! `wl-api`, and provides the `wl` command-line interface.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, ExportArgs, SyncArgs};
pub use config::{Config, ConfigError, GitHubSettings, NotificationSettings, dirs_state_path};
