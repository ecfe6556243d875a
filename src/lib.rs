//! dirindexer library
//!
//! Keeps a full-text index synchronized with a directory tree: one-shot full
//! indexing, incremental updates by modification time, and a watch daemon
//! that batches live changes into periodic commits.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod storage;
pub mod sync;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
