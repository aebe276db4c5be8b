//! # Loupe Server
//!
//! Serves the transform registry over a WebSocket. One connection, one
//! [`TransformContext`](loupe_transform::TransformContext); a shared
//! [`FileWatcher`] tells every connection which cached files went stale.

pub mod config;
pub mod server;
pub mod watcher;

pub use config::{Config, ConfigError, DEFAULT_BIND, DEFAULT_CONFIG_NAME};
pub use server::{create_app, respond, serve, AppState};
pub use watcher::{FileWatcher, WatcherError};
