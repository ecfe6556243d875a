//! Directory synchronization.
//!
//! This module provides:
//! - Path filtering for indexing and traversal
//! - Lazy directory scanning with subtree pruning
//! - Reconciliation of disk state against indexed state
//! - Lenient document loading
//! - Full-index and incremental-update runs

mod filter;
mod loader;
mod reconcile;
mod scanner;
mod syncer;

pub use filter::{is_hidden, ExtensionRule, FilterConfig, PathFilter};
pub use loader::{decode_dropping_invalid, load};
pub use reconcile::{disk_mtime, reconcile_update, ChangeSet};
pub use scanner::{resolve_root, scan, Scan, ScanCandidate, ScanStats, ScanStatsSnapshot};
pub use syncer::{IndexSyncer, SyncReport};
