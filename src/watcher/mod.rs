//! Live filesystem watching.
//!
//! This module provides:
//! - Classification of raw notifications into change events
//! - A recursive subscription feeding a shared pending queue
//! - Periodic coalescing of queued events into index commits
//! - The long-running daemon tying these together

mod coalescer;
mod daemon;
mod events;
mod subscription;

pub use coalescer::{
    coalesce, CoalescerStats, CoalescerStatsSnapshot, FlushOutcome, PendingQueue, Sequenced,
    WatchCoalescer,
};
pub use daemon::run_daemon;
pub use events::WatchEvent;
pub use subscription::FileWatcher;
