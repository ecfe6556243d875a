//! Configuration management for dirindexer.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{default_concurrency, Config, DEFAULT_FLUSH_DELAY, DEFAULT_INDEX_DIR};
