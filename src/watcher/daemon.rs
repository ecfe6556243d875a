//! Long-running watch mode.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::coalescer::{CoalescerStatsSnapshot, WatchCoalescer};
use super::subscription::FileWatcher;
use crate::config::Config;
use crate::storage::{IndexEngine, IndexWriter};
use crate::sync::resolve_root;
use crate::{Error, Result};

/// Watch `config.root` and keep the index current until `shutdown` resolves.
///
/// On shutdown the subscription is dropped first, then the coalescer drains
/// whatever is still queued, the writer issues a last commit and the engine
/// is closed.
///
/// # Errors
///
/// Returns `Error::NotFound` for a missing root, a watcher error if the
/// subscription fails, or an index error from the final drain, commit or
/// close.
pub async fn run_daemon<E, S>(
    config: &Config,
    engine: E,
    shutdown: S,
) -> Result<CoalescerStatsSnapshot>
where
    E: IndexEngine,
    E::Writer: 'static,
    S: Future<Output = ()>,
{
    let root = resolve_root(&config.root)?;
    let filter = config.path_filter();
    let coalescer = Arc::new(WatchCoalescer::new(
        root.clone(),
        filter.clone(),
        config.flush_delay,
    ));

    let writer = engine.writer()?;
    let subscription = FileWatcher::subscribe(&root, &filter, coalescer.queue())?;

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let coalescer = Arc::clone(&coalescer);
        let cancel = cancel.clone();
        async move { coalescer.run(writer, cancel).await }
    });

    tracing::info!(
        root = %root.display(),
        flush_delay_ms = u64::try_from(config.flush_delay.as_millis()).unwrap_or(u64::MAX),
        "Daemon running, waiting for shutdown signal"
    );

    shutdown.await;
    tracing::info!("Shutdown requested");

    drop(subscription);
    cancel.cancel();

    let mut writer = task
        .await
        .map_err(|e| Error::internal(format!("coalescer task failed: {e}")))??;
    writer.commit()?;
    drop(writer);

    engine.close()?;

    let stats = coalescer.stats();
    tracing::info!(
        events = stats.events_received,
        commits = stats.commits,
        added = stats.documents_added,
        deleted = stats.documents_deleted,
        errors = stats.errors,
        "Daemon stopped"
    );

    Ok(stats)
}
