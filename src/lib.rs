//! Mooring Library
//!
//! Branch-aware client that keeps a remote code-search index synchronized
//! with a local git checkout and serves semantic searches against it.
//!
//! # Architecture
//!
//! Mooring is organized into the following modules:
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and Result aliases
//! - [`git`]: Git context discovery (branch, base branch, diffs)
//! - [`index`]: Chunking, identity, client cache, and the reconcile scanner
//! - [`remote`]: Typed client for the managed index service
//! - [`watcher`]: Debounced filesystem watching and incremental re-indexing
//! - [`engine`]: Orchestration and the public engine API
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mooring::{Config, Engine};
//!
//! #[tokio::main]
//! async fn main() -> mooring::Result<()> {
//!     let config = Config::new();
//!     let engine = Engine::new(config)?;
//!     let handle = engine
//!         .start(Arc::new(|event| println!("{:?}: {}", event.status, event.message)))
//!         .await?;
//!     // ... later
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod index;
pub mod observability;
pub mod remote;
pub mod watcher;

pub use config::Config;
pub use engine::{Engine, EngineHandle, IndexerStatus, StateEvent};
pub use error::{Error, Result};
