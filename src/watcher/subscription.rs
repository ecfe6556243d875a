//! Recursive filesystem subscription using notify-rs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use super::coalescer::PendingQueue;
use super::events::WatchEvent;
use crate::error::WatcherError;
use crate::sync::PathFilter;
use crate::Result;

/// A live recursive watch on one directory.
///
/// Classified events under the root go straight into the pending queue,
/// except those inside directories the filter ignores. Dropping the
/// subscription stops delivery.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::WatchFailed` if the directory is missing or
    /// the platform refuses the subscription.
    pub fn subscribe(root: &Path, filter: &PathFilter, queue: Arc<PendingQueue>) -> Result<Self> {
        if !root.is_dir() {
            return Err(WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        let watched = root.to_path_buf();
        let filter = filter.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for change in WatchEvent::from_notify(&event)
                        .into_iter()
                        .filter_map(|e| clip_to_root(&watched, &filter, e))
                    {
                        tracing::trace!(event = ?change, "Queued change");
                        queue.push(change);
                    }
                }
                Err(e) => {
                    tracing::error!("Watch error: {:?}", e);
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(path = %root.display(), "Watching directory");

        Ok(Self {
            watcher,
            root: root.to_path_buf(),
        })
    }

    /// The watched directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            tracing::debug!(error = %e, "Unwatch failed");
        }
        tracing::info!(path = %self.root.display(), "Stopped watching directory");
    }
}

/// Drop events outside `root` or inside an ignored directory; a move across
/// that boundary becomes a plain delete or create of its inside half.
fn clip_to_root(root: &Path, filter: &PathFilter, event: WatchEvent) -> Option<WatchEvent> {
    let inside = |path: &Path| path.starts_with(root) && !filter.is_ignored(path);

    match event {
        WatchEvent::Moved { from, to } => match (inside(&from), inside(&to)) {
            (true, true) => Some(WatchEvent::Moved { from, to }),
            (true, false) => Some(WatchEvent::Deleted(from)),
            (false, true) => Some(WatchEvent::Created(to)),
            (false, false) => None,
        },
        other => inside(other.affected_path()).then_some(other),
    }
}
