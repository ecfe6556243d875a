//! Directory scanner.
//!
//! Walks a root lazily, following symbolic links, and yields the files
//! accepted by a [`PathFilter`]. Rejected directories are pruned before
//! descent, so nothing below them is ever visited.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ignore::{DirEntry, Walk, WalkBuilder};

use super::filter::PathFilter;
use crate::{Error, Result};

/// Scan statistics.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub files_found: AtomicU64,
    pub files_skipped: AtomicU64,
    pub dirs_pruned: AtomicU64,
    pub errors: AtomicU64,
}

impl ScanStats {
    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            files_found: self.files_found.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            dirs_pruned: self.dirs_pruned.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scan stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatsSnapshot {
    pub files_found: u64,
    pub files_skipped: u64,
    pub dirs_pruned: u64,
    pub errors: u64,
}

/// One traversal step, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub path: PathBuf,
    pub extension: Option<String>,
    pub is_directory: bool,
}

impl ScanCandidate {
    fn from_entry(entry: &DirEntry) -> Self {
        let path = entry.path().to_path_buf();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());
        let is_directory = entry.file_type().is_some_and(|t| t.is_dir());

        Self {
            path,
            extension,
            is_directory,
        }
    }

    /// Whether `filter` lets this candidate through.
    #[must_use]
    pub fn is_eligible(&self, filter: &PathFilter) -> bool {
        if self.is_directory {
            filter.accepts_dir(&self.path)
        } else {
            filter.accepts(&self.path)
        }
    }
}

/// Canonicalize a scan root.
///
/// # Errors
///
/// Returns `Error::NotFound` if `root` does not exist or is not a directory.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    let resolved = root.canonicalize().map_err(|_| Error::not_found(root))?;
    if !resolved.is_dir() {
        return Err(Error::not_found(root));
    }
    Ok(resolved)
}

/// Lazy sequence of eligible file paths under a root.
pub struct Scan {
    walk: Walk,
    root: PathBuf,
    stats: Arc<ScanStats>,
}

impl Scan {
    /// Statistics accumulated so far.
    #[must_use]
    pub fn stats(&self) -> ScanStatsSnapshot {
        self.stats.snapshot()
    }

    /// The root being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for Scan {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match self.walk.next()? {
                Ok(entry) => {
                    if entry.depth() == 0 {
                        continue;
                    }
                    if entry.file_type().map_or(true, |t| t.is_dir()) {
                        continue;
                    }
                    return Some(entry.into_path());
                }
                Err(e) => {
                    // Symlink loops surface here as `ignore::Error::Loop`.
                    tracing::warn!(root = %self.root.display(), error = %e, "Error walking directory");
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

/// Scan a directory for indexable files.
///
/// Each call walks the tree from scratch.
///
/// # Errors
///
/// Returns `Error::NotFound` if `root` does not exist or is not a directory.
pub fn scan(root: &Path, filter: &PathFilter) -> Result<Scan> {
    if !root.is_dir() {
        return Err(Error::not_found(root));
    }

    tracing::debug!(root = %root.display(), "Starting directory scan");

    let stats = Arc::new(ScanStats::default());
    let entry_stats = Arc::clone(&stats);
    let entry_filter = filter.clone();

    let walk = WalkBuilder::new(root)
        .standard_filters(false) // hidden and extension rules come from PathFilter
        .follow_links(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }

            let candidate = ScanCandidate::from_entry(entry);
            let eligible = candidate.is_eligible(&entry_filter);

            if candidate.is_directory {
                if !eligible {
                    entry_stats.dirs_pruned.fetch_add(1, Ordering::Relaxed);
                }
            } else {
                entry_stats.files_found.fetch_add(1, Ordering::Relaxed);
                if !eligible {
                    entry_stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                }
            }

            eligible
        })
        .build();

    Ok(Scan {
        walk,
        root: root.to_path_buf(),
        stats,
    })
}
