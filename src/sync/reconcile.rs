//! Diffing disk state against indexed state.
//!
//! Two modes:
//! - full: every scanned path is an addition
//! - update: indexed `(path, last_modified)` records are compared with the
//!   filesystem and with a fresh scan

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::storage::IndexRecord;

/// Paths to add, replace, or drop. The three sets are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Paths not previously indexed.
    pub added: BTreeSet<PathBuf>,
    /// Indexed paths whose file is newer than the stored copy.
    pub changed: BTreeSet<PathBuf>,
    /// Indexed paths that must be dropped.
    pub removed: BTreeSet<PathBuf>,
}

impl ChangeSet {
    /// Full mode: every scanned path is added.
    pub fn full(scanned: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            added: scanned.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Paths to delete from the index, in application order.
    pub fn deletions(&self) -> impl Iterator<Item = &PathBuf> {
        self.removed.iter().chain(self.changed.iter())
    }

    /// Paths to (re-)add to the index, in application order.
    pub fn additions(&self) -> impl Iterator<Item = &PathBuf> {
        self.added.iter().chain(self.changed.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Total number of paths touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }
}

/// Modification time of a path in nanoseconds since the Unix epoch, or
/// `None` if it no longer exists.
#[must_use]
pub fn disk_mtime(path: &Path) -> Option<i64> {
    let metadata = std::fs::metadata(path).ok()?;
    Some(metadata.modified().map_or(0, crate::storage::system_time_to_nanos))
}

/// Update mode.
///
/// `stat` reports the current modification time of an indexed path, or
/// `None` if it is gone. `scanned` is a fresh traversal of the root.
pub fn reconcile_update<F>(
    indexed: &[IndexRecord],
    stat: F,
    scanned: impl IntoIterator<Item = PathBuf>,
) -> ChangeSet
where
    F: Fn(&Path) -> Option<i64>,
{
    let mut changes = ChangeSet::default();
    let mut known: HashSet<PathBuf> = HashSet::with_capacity(indexed.len());
    let mut stale: BTreeSet<PathBuf> = BTreeSet::new();

    for record in indexed {
        let path = PathBuf::from(&record.path);
        known.insert(path.clone());

        match stat(&path) {
            None => {
                tracing::debug!(path = %path.display(), "Indexed file no longer exists");
                changes.removed.insert(path);
            }
            Some(mtime) if mtime > record.last_modified => {
                tracing::debug!(path = %path.display(), "Indexed file is stale");
                stale.insert(path);
            }
            Some(_) => {}
        }
    }

    for path in scanned {
        if stale.remove(&path) {
            changes.changed.insert(path);
        } else if !known.contains(&path) {
            changes.added.insert(path);
        }
    }

    // Stale paths the scan no longer yields are now filtered out.
    changes.removed.extend(stale);

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(path: &str, last_modified: i64) -> IndexRecord {
        IndexRecord {
            path: path.to_string(),
            title: path.to_string(),
            last_modified,
        }
    }

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<PathBuf> {
        paths(list).into_iter().collect()
    }

    fn stat_from<'a>(disk: &'a HashMap<&'static str, i64>) -> impl Fn(&Path) -> Option<i64> + 'a {
        move |p| disk.get(p.to_str().unwrap()).copied()
    }

    #[test]
    fn test_full_mode_adds_everything() {
        let changes = ChangeSet::full(paths(&["/r/a", "/r/b"]));
        assert_eq!(changes.added, set(&["/r/a", "/r/b"]));
        assert!(changes.changed.is_empty());
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_unchanged_mtime_is_noop() {
        let indexed = vec![record("/r/a", 10), record("/r/b", 20)];
        let disk = HashMap::from([("/r/a", 10), ("/r/b", 20)]);

        let changes = reconcile_update(&indexed, stat_from(&disk), paths(&["/r/a", "/r/b"]));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_newer_mtime_is_changed_once() {
        let indexed = vec![record("/r/a", 10), record("/r/b", 20), record("/r/c", 30)];
        let disk = HashMap::from([("/r/a", 10), ("/r/b", 25), ("/r/c", 30)]);

        let changes = reconcile_update(
            &indexed,
            stat_from(&disk),
            paths(&["/r/a", "/r/b", "/r/c"]),
        );

        assert_eq!(changes.changed, set(&["/r/b"]));
        assert_eq!(changes.deletions().count(), 1);
        assert_eq!(changes.additions().count(), 1);
    }

    #[test]
    fn test_older_mtime_is_ignored() {
        let indexed = vec![record("/r/a", 10)];
        let disk = HashMap::from([("/r/a", 5)]);

        let changes = reconcile_update(&indexed, stat_from(&disk), paths(&["/r/a"]));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_deleted_file_removed_once() {
        let indexed = vec![record("/r/a", 10), record("/r/gone", 10)];
        let disk = HashMap::from([("/r/a", 10)]);

        let changes = reconcile_update(&indexed, stat_from(&disk), paths(&["/r/a"]));
        assert_eq!(changes.removed, set(&["/r/gone"]));
        assert_eq!(changes.additions().count(), 0);
    }

    #[test]
    fn test_new_file_added() {
        let indexed = vec![record("/r/a", 10)];
        let disk = HashMap::from([("/r/a", 10), ("/r/new", 1)]);

        let changes = reconcile_update(&indexed, stat_from(&disk), paths(&["/r/a", "/r/new"]));
        assert_eq!(changes.added, set(&["/r/new"]));
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_stale_but_filtered_out_is_only_removed() {
        let indexed = vec![record("/r/a.log", 10)];
        let disk = HashMap::from([("/r/a.log", 50)]);

        let changes = reconcile_update(&indexed, stat_from(&disk), Vec::new());
        assert_eq!(changes.removed, set(&["/r/a.log"]));
        assert!(changes.changed.is_empty());
        assert!(changes.added.is_empty());
    }

    #[test]
    fn test_sets_are_disjoint_and_deterministic() {
        let indexed = vec![record("/r/a", 1), record("/r/b", 1), record("/r/c", 1)];
        let disk = HashMap::from([("/r/a", 2), ("/r/c", 1), ("/r/d", 1)]);
        let scanned = paths(&["/r/d", "/r/c", "/r/a"]);

        let first = reconcile_update(&indexed, stat_from(&disk), scanned.clone());
        let second = reconcile_update(&indexed, stat_from(&disk), scanned);
        assert_eq!(first, second);

        for p in &first.added {
            assert!(!first.changed.contains(p) && !first.removed.contains(p));
        }
        for p in &first.changed {
            assert!(!first.removed.contains(p));
        }
        assert_eq!(first.len(), 3);
    }
}
