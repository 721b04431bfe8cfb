//! Configuration management for Mooring.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Host-provided defaults

mod settings;

pub use settings::{ChunkingConfig, Config};
