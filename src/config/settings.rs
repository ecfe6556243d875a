//! Configuration settings and validation.

use std::path::PathBuf;
use std::time::Duration;

use crate::sync::{FilterConfig, PathFilter};
use crate::{Error, Result};

/// Default delay between watch flushes.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(5);

/// Default index location, relative to the working directory.
pub const DEFAULT_INDEX_DIR: &str = ".indexdir";

/// Upper bound for parallel document loads.
const MAX_CONCURRENCY: usize = 256;

/// Resolved configuration shared by every command.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory tree being indexed.
    pub root: PathBuf,

    /// Where the index engine keeps its files.
    pub index_dir: PathBuf,

    /// Which paths are eligible.
    pub filter: FilterConfig,

    /// Maximum number of documents loaded in parallel.
    pub concurrency: usize,

    /// Delay between watch flushes.
    pub flush_delay: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            filter: FilterConfig::default(),
            concurrency: default_concurrency(),
            flush_delay: DEFAULT_FLUSH_DELAY,
            log_level: "info".to_string(),
        }
    }
}

/// Half of the available hardware parallelism, at least one.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() / 2).max(1))
        .unwrap_or(1)
}

impl Config {
    /// Create a configuration for `root` with defaults.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// The path filter for scans and watch events.
    ///
    /// The index directory is ignored when it exists, so the index never
    /// picks up its own database files.
    #[must_use]
    pub fn path_filter(&self) -> PathFilter {
        let filter = PathFilter::new(self.filter.clone());
        match self.index_dir.canonicalize() {
            Ok(dir) => filter.ignoring(dir),
            Err(_) => filter,
        }
    }

    /// Check that the values can drive a run.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(Error::config(format!(
                "invalid log level '{}', expected trace, debug, info, warn or error",
                self.log_level
            )));
        }

        if self.concurrency == 0 {
            return Err(Error::config("concurrency cannot be 0"));
        }

        if self.concurrency > MAX_CONCURRENCY {
            return Err(Error::config(format!(
                "concurrency cannot exceed {MAX_CONCURRENCY}"
            )));
        }

        if self.flush_delay.is_zero() {
            return Err(Error::config("flush delay cannot be 0"));
        }

        if self.index_dir.as_os_str().is_empty() {
            return Err(Error::config("index directory cannot be empty"));
        }

        Ok(())
    }
}
