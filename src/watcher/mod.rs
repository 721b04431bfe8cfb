//! Filesystem watching and incremental re-indexing.
//!
//! This module provides:
//! - Workspace watching using notify-rs with a debounce window
//! - Extension and gitignore-aware event filtering
//! - Batched incremental upload of changed files
//! - Server-side cleanup for deleted files

mod events;
mod handler;
#[allow(clippy::module_inception)]
mod watcher;

pub use events::{EventBatch, FileEvent};
pub use handler::EventHandler;
pub use watcher::WorkspaceWatcher;
