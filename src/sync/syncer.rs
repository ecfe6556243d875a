//! Full-index and incremental-update runs.
//!
//! A run is: scan, reconcile, delete, load, add, commit. Loads run
//! concurrently up to the configured bound; every index mutation and the
//! single commit happen on the calling task, so a changed path is always
//! deleted before it is re-added.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::filter::PathFilter;
use super::loader::load;
use super::reconcile::{disk_mtime, reconcile_update, ChangeSet};
use super::scanner::{resolve_root, scan};
use crate::config::Config;
use crate::storage::{IndexEngine, IndexReader, IndexWriter};
use crate::{Error, Result};

/// Outcome of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Paths newly added.
    pub added: usize,
    /// Paths deleted and re-added.
    pub changed: usize,
    /// Paths deleted only.
    pub removed: usize,
    /// Documents written to the index.
    pub indexed: usize,
    /// Files skipped because they could not be read.
    pub failed: usize,
}

/// Orchestrates sync runs against an index engine.
pub struct IndexSyncer<'a, E: IndexEngine> {
    engine: &'a E,
    filter: PathFilter,
    concurrency: usize,
}

impl<'a, E: IndexEngine> IndexSyncer<'a, E> {
    /// Create a syncer.
    #[must_use]
    pub fn new(engine: &'a E, filter: PathFilter, concurrency: usize) -> Self {
        Self {
            engine,
            filter,
            concurrency: concurrency.max(1),
        }
    }

    /// Create a syncer from resolved configuration.
    #[must_use]
    pub fn from_config(engine: &'a E, config: &Config) -> Self {
        Self::new(engine, config.path_filter(), config.concurrency)
    }

    /// Index every eligible file under `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for a missing root, or an index error if a
    /// mutation or the commit fails.
    pub async fn run_full_index(&self, root: &Path) -> Result<SyncReport> {
        let root = resolve_root(root)?;
        tracing::info!(root = %root.display(), "Starting full index");

        let filter = self.filter.clone();
        let changes = blocking(move || Ok(ChangeSet::full(collect_scan(&root, &filter)?))).await?;

        self.apply(&changes).await
    }

    /// Bring the index in line with the files under `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for a missing root, or an index error if
    /// reading stored records, a mutation, or the commit fails.
    pub async fn run_update(&self, root: &Path) -> Result<SyncReport> {
        let root = resolve_root(root)?;
        tracing::info!(root = %root.display(), "Starting incremental update");

        let indexed = self.engine.reader()?.all_stored_records()?;
        tracing::debug!(records = indexed.len(), "Loaded stored records");

        let filter = self.filter.clone();
        let changes = blocking(move || {
            let scanned = collect_scan(&root, &filter)?;
            Ok(reconcile_update(&indexed, disk_mtime, scanned))
        })
        .await?;

        self.apply(&changes).await
    }

    async fn apply(&self, changes: &ChangeSet) -> Result<SyncReport> {
        let mut report = SyncReport {
            added: changes.added.len(),
            changed: changes.changed.len(),
            removed: changes.removed.len(),
            ..SyncReport::default()
        };

        let mut writer = self.engine.writer()?;

        for path in changes.deletions() {
            writer.delete_by_path(path)?;
        }

        let mut loads = stream::iter(changes.additions())
            .map(|path| async move { (path, load(path).await) })
            .buffer_unordered(self.concurrency);

        while let Some((path, loaded)) = loads.next().await {
            match loaded {
                Ok(doc) => {
                    tracing::debug!(path = %path.display(), "Indexing");
                    writer.add_document(doc)?;
                    report.indexed += 1;
                }
                Err(e) if e.is_per_file() => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    report.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            indexed = report.indexed,
            removed = report.removed + report.changed,
            failed = report.failed,
            "Writing {} files to index",
            report.indexed
        );
        writer.commit()?;

        Ok(report)
    }
}

fn collect_scan(root: &Path, filter: &PathFilter) -> Result<Vec<PathBuf>> {
    let mut walk = scan(root, filter)?;
    let paths: Vec<PathBuf> = walk.by_ref().collect();

    let stats = walk.stats();
    tracing::info!(
        root = %root.display(),
        found = stats.files_found,
        eligible = paths.len(),
        skipped = stats.files_skipped,
        pruned = stats.dirs_pruned,
        errors = stats.errors,
        "Directory scan complete"
    );

    Ok(paths)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("scan task failed: {e}")))?
}
