//! Configuration management for Semdex.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables

mod settings;

pub use settings::{Config, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
