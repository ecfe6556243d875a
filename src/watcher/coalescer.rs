//! Batching of live change events into periodic index commits.
//!
//! The watch callback pushes into a [`PendingQueue`]. On every tick the
//! coalescer drains the whole queue at once, keeps only the newest event per
//! affected path and applies the survivors: every removal first, then every
//! addition, so a subtree removal never undoes a file added by a newer
//! event. It commits once if anything was written.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::events::WatchEvent;
use crate::storage::IndexWriter;
use crate::sync::{load, scan, PathFilter};
use crate::{Error, Result};

/// An event tagged with its arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequenced {
    pub seq: u64,
    pub event: WatchEvent,
}

#[derive(Debug, Default)]
struct QueueState {
    next_seq: u64,
    events: Vec<Sequenced>,
}

/// Events waiting for the next flush.
///
/// Pushed from the watcher thread, drained from the flush task. Each push
/// gets a strictly increasing sequence number.
#[derive(Debug, Default)]
pub struct PendingQueue {
    state: Mutex<QueueState>,
}

impl PendingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its sequence number.
    pub fn push(&self, event: WatchEvent) -> u64 {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.events.push(Sequenced { seq, event });
        seq
    }

    /// Take every pending event, leaving the queue empty.
    #[must_use]
    pub fn drain(&self) -> Vec<Sequenced> {
        std::mem::take(&mut self.state.lock().events)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    /// Events pushed since creation.
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.state.lock().next_seq
    }
}

/// Keep the newest event per affected path, newest first.
#[must_use]
pub fn coalesce(mut drained: Vec<Sequenced>) -> Vec<WatchEvent> {
    drained.sort_unstable_by(|a, b| b.seq.cmp(&a.seq));

    let mut seen: HashSet<PathBuf> = HashSet::with_capacity(drained.len());
    drained
        .into_iter()
        .filter(|s| seen.insert(s.event.affected_path().to_path_buf()))
        .map(|s| s.event)
        .collect()
}

/// Result of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Events taken from the queue.
    pub drained: usize,
    /// Events left after deduplication.
    pub coalesced: usize,
    /// Adds and deletes issued to the writer.
    pub mutations: usize,
    /// Whether a commit was issued.
    pub committed: bool,
}

/// Coalescer statistics.
#[derive(Debug, Default)]
pub struct CoalescerStats {
    pub flushes: AtomicU64,
    pub commits: AtomicU64,
    pub documents_added: AtomicU64,
    pub documents_deleted: AtomicU64,
    pub files_filtered: AtomicU64,
    pub errors: AtomicU64,
}

/// Snapshot of coalescer stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoalescerStatsSnapshot {
    pub events_received: u64,
    pub flushes: u64,
    pub commits: u64,
    pub documents_added: u64,
    pub documents_deleted: u64,
    pub files_filtered: u64,
    pub errors: u64,
}

/// Turns queued watch events into index mutations.
pub struct WatchCoalescer {
    root: PathBuf,
    filter: PathFilter,
    delay: Duration,
    queue: Arc<PendingQueue>,
    stats: CoalescerStats,
}

impl WatchCoalescer {
    /// Create a coalescer for events under `root`, flushing every `delay`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, filter: PathFilter, delay: Duration) -> Self {
        Self {
            root: root.into(),
            filter,
            delay,
            queue: Arc::new(PendingQueue::new()),
            stats: CoalescerStats::default(),
        }
    }

    /// Shared handle for producers.
    #[must_use]
    pub fn queue(&self) -> Arc<PendingQueue> {
        Arc::clone(&self.queue)
    }

    pub fn push(&self, event: WatchEvent) -> u64 {
        self.queue.push(event)
    }

    #[must_use]
    pub fn stats(&self) -> CoalescerStatsSnapshot {
        CoalescerStatsSnapshot {
            events_received: self.queue.total_pushed(),
            flushes: self.stats.flushes.load(Ordering::Relaxed),
            commits: self.stats.commits.load(Ordering::Relaxed),
            documents_added: self.stats.documents_added.load(Ordering::Relaxed),
            documents_deleted: self.stats.documents_deleted.load(Ordering::Relaxed),
            files_filtered: self.stats.files_filtered.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
        }
    }

    /// Apply everything queued so far.
    ///
    /// # Errors
    ///
    /// Returns an index error if a mutation or the commit fails. The writer
    /// is rolled back then, and the drained events are not retried.
    pub async fn flush<W: IndexWriter>(&self, writer: &mut W) -> Result<FlushOutcome> {
        let drained = self.queue.drain();
        if drained.is_empty() {
            return Ok(FlushOutcome::default());
        }

        let mut outcome = FlushOutcome {
            drained: drained.len(),
            ..FlushOutcome::default()
        };
        let events = coalesce(drained);
        outcome.coalesced = events.len();
        self.stats.flushes.fetch_add(1, Ordering::Relaxed);

        // A failed flush must not leave half a batch for the next commit.
        outcome.mutations = match self.apply_all(writer, &events).await {
            Ok(mutations) => mutations,
            Err(e) => {
                writer.rollback();
                return Err(e);
            }
        };

        if outcome.mutations > 0 {
            if let Err(e) = writer.commit() {
                writer.rollback();
                return Err(e);
            }
            outcome.committed = true;
            self.stats.commits.fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!(
            drained = outcome.drained,
            coalesced = outcome.coalesced,
            mutations = outcome.mutations,
            committed = outcome.committed,
            "Flushed pending events"
        );

        Ok(outcome)
    }

    /// Flush on every tick until `cancel` fires, then drain once more.
    ///
    /// Periodic flush failures are logged and the loop keeps going. The
    /// writer is handed back for the final commit.
    ///
    /// # Errors
    ///
    /// Returns the error of the final drain, if any.
    pub async fn run<W: IndexWriter>(&self, mut writer: W, cancel: CancellationToken) -> Result<W> {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.delay, self.delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            root = %self.root.display(),
            delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
            "Coalescer started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.flush(&mut writer).await {
                        self.stats.errors.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(error = %e, "Failed to flush pending events");
                    }
                }
            }
        }

        self.flush(&mut writer).await?;
        tracing::info!("Coalescer stopped");

        Ok(writer)
    }

    async fn apply_all<W: IndexWriter>(
        &self,
        writer: &mut W,
        events: &[WatchEvent],
    ) -> Result<usize> {
        let mut mutations = 0;

        for event in events {
            mutations += match event {
                WatchEvent::Created(_) => 0,
                WatchEvent::Modified(path) => self.delete(writer, path, false)?,
                WatchEvent::Deleted(path) | WatchEvent::Moved { from: path, .. } => {
                    self.delete(writer, path, true)?
                }
            };
        }

        for event in events {
            mutations += match event {
                WatchEvent::Deleted(_) => 0,
                WatchEvent::Modified(path) => self.add_if_accepted(writer, path, false).await?,
                WatchEvent::Created(path) | WatchEvent::Moved { to: path, .. } => {
                    self.add_if_accepted(writer, path, true).await?
                }
            };
        }

        Ok(mutations)
    }

    /// Remove `path`, and with `subtree` everything stored below it. The
    /// path may have been a directory, which can no longer be checked.
    fn delete<W: IndexWriter>(
        &self,
        writer: &mut W,
        path: &Path,
        subtree: bool,
    ) -> Result<usize> {
        if self.filter.is_ignored(path) {
            return Ok(0);
        }

        tracing::debug!(path = %path.display(), subtree, "Removing from index");
        writer.delete_by_path(path)?;
        if subtree {
            writer.delete_under(path)?;
        }
        self.stats.documents_deleted.fetch_add(1, Ordering::Relaxed);
        Ok(1)
    }

    /// Add `path` if the filter accepts it. A directory is walked when
    /// `descend` is set and skipped otherwise.
    async fn add_if_accepted<W: IndexWriter>(
        &self,
        writer: &mut W,
        path: &Path,
        descend: bool,
    ) -> Result<usize> {
        let is_dir = path.is_dir();
        if is_dir && !descend {
            return Ok(0);
        }

        let accepted = path.starts_with(&self.root)
            && if is_dir {
                self.filter.accepts_dir_under(&self.root, path)
            } else {
                self.filter.accepts_under(&self.root, path)
            };
        if !accepted {
            tracing::trace!(path = %path.display(), "Filtered");
            self.stats.files_filtered.fetch_add(1, Ordering::Relaxed);
            return Ok(0);
        }

        if is_dir {
            self.add_tree(writer, path).await
        } else {
            self.load_and_add(writer, path).await
        }
    }

    async fn add_tree<W: IndexWriter>(&self, writer: &mut W, dir: &Path) -> Result<usize> {
        let walk_root = dir.to_path_buf();
        let filter = self.filter.clone();
        let walked = tokio::task::spawn_blocking(move || {
            scan(&walk_root, &filter).map(Iterator::collect::<Vec<PathBuf>>)
        })
        .await
        .map_err(|e| Error::internal(format!("scan task failed: {e}")))?;

        let files = match walked {
            Ok(files) => files,
            Err(Error::NotFound { .. }) => {
                tracing::debug!(path = %dir.display(), "Directory vanished before walk");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(path = %dir.display(), files = files.len(), "Indexing directory");
        let mut added = 0;
        for file in &files {
            added += self.load_and_add(writer, file).await?;
        }
        Ok(added)
    }

    async fn load_and_add<W: IndexWriter>(&self, writer: &mut W, path: &Path) -> Result<usize> {
        match load(path).await {
            Ok(doc) => {
                tracing::debug!(path = %path.display(), "Indexing");
                writer.add_document(doc)?;
                self.stats.documents_added.fetch_add(1, Ordering::Relaxed);
                Ok(1)
            }
            Err(e) if e.is_per_file() => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}
