//! Core library for trk - a private torrent-tracker CLI.
//!
//! This crate provides:
//! - Configuration loading and management
//! - XDG-compliant path resolution
//! - Schema and example config generation
//! - Tracker transport, session store, and connection management
//! - One-shot operation executors (search, download, upload, ...)
//! - The shoutbox incremental-poll state machine
//! - Common types and error handling

pub mod config;
pub mod error;
pub mod paths;
pub mod schema;
pub mod tracker;

pub use config::{AppConfig, LogLevel, LoggingConfig, PathsConfig, RuntimeConfig, TrackerConfig};
pub use error::{CoreError, Result};
pub use paths::{AppPaths, default_data_dir, default_state_dir};
pub use schema::{generate_example_config, generate_schema};
pub use tracker::{
    Connection, Credentials, HttpTracker, PollState, Poller, Session, SessionStore, ShoutMessage,
    Shoutbox, TrackerApi,
};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "trk";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
