//! Integration tests for indexing, updating and searching an on-disk index.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use dirindexer::storage::{IndexEngine, IndexReader, SqliteIndex};
use dirindexer::sync::{FilterConfig, IndexSyncer, PathFilter};
use dirindexer::{Config, Error};
use tempfile::TempDir;

fn write_tree(root: &Path) {
    fs::create_dir_all(root.join("notes/deep")).unwrap();
    fs::create_dir_all(root.join(".cache")).unwrap();

    fs::write(root.join("readme.txt"), "project overview and setup").unwrap();
    fs::write(root.join("notes/todo.md"), "buy milk, fix the flux capacitor").unwrap();
    fs::write(
        root.join("notes/deep/plan.md"),
        "a long plan about the flux capacitor",
    )
    .unwrap();
    fs::write(root.join("build.log"), "flux warnings everywhere").unwrap();
    fs::write(root.join(".cache/blob.txt"), "flux cached").unwrap();
}

fn touch_forward(path: &Path) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(300))
        .unwrap();
}

fn stored_paths(index: &SqliteIndex) -> Vec<String> {
    index
        .reader()
        .unwrap()
        .all_stored_records()
        .unwrap()
        .into_iter()
        .map(|r| r.path)
        .collect()
}

fn config_for(root: &Path, index_dir: &Path, exclude: &[&str]) -> Config {
    let mut config = Config::new(root);
    config.index_dir = index_dir.to_path_buf();
    config.filter = FilterConfig::new(false, exclude, &[]).unwrap();
    config.concurrency = 3;
    config
}

/// Full index respects the filter and is searchable.
#[tokio::test]
async fn test_full_index_then_search() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write_tree(&root);
    let config = config_for(&root, &tmp.path().join("index"), &["log"]);

    let index = SqliteIndex::open_or_create(&config.index_dir).unwrap();
    let report = IndexSyncer::from_config(&index, &config)
        .run_full_index(&config.root)
        .await
        .unwrap();

    assert_eq!(report.indexed, 3);
    assert_eq!(report.failed, 0);

    let hits = index.reader().unwrap().search("flux capacitor", None).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.path.ends_with(".md")));
    assert!(hits.iter().all(|h| !h.highlights.is_empty()));

    let limited = index.reader().unwrap().search("flux", Some(1)).unwrap();
    assert_eq!(limited.len(), 1);
}

/// The index survives closing and reopening.
#[tokio::test]
async fn test_index_persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write_tree(&root);
    let config = config_for(&root, &tmp.path().join("index"), &[]);

    let index = SqliteIndex::open_or_create(&config.index_dir).unwrap();
    IndexSyncer::from_config(&index, &config)
        .run_full_index(&config.root)
        .await
        .unwrap();
    let before = stored_paths(&index);
    index.close().unwrap();

    let reopened = SqliteIndex::open_or_create(&config.index_dir).unwrap();
    assert_eq!(stored_paths(&reopened), before);
    assert_eq!(reopened.count_documents().unwrap(), 4);
}

/// Update picks up an edit, a deletion and a new file in one run.
#[tokio::test]
async fn test_update_after_edits() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write_tree(&root);
    let config = config_for(&root, &tmp.path().join("index"), &["log"]);
    let index = SqliteIndex::open_or_create(&config.index_dir).unwrap();
    let syncer = IndexSyncer::from_config(&index, &config);

    syncer.run_full_index(&config.root).await.unwrap();

    let readme = root.join("readme.txt");
    fs::write(&readme, "rewritten overview mentioning zeppelins").unwrap();
    touch_forward(&readme);
    fs::remove_file(root.join("notes/todo.md")).unwrap();
    fs::write(root.join("notes/new.txt"), "fresh zeppelins").unwrap();

    let report = syncer.run_update(&config.root).await.unwrap();

    assert_eq!(report.changed, 1);
    assert_eq!(report.removed, 1);
    assert_eq!(report.added, 1);

    let paths = stored_paths(&index);
    assert_eq!(paths.len(), 3);
    assert!(!paths.iter().any(|p| p.ends_with("todo.md")));

    let hits = index.reader().unwrap().search("zeppelins", None).unwrap();
    assert_eq!(hits.len(), 2);

    let again = syncer.run_update(&config.root).await.unwrap();
    assert_eq!(again.indexed + again.removed + again.changed, 0);
}

/// Running full index twice leaves one document per path.
#[tokio::test]
async fn test_full_index_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write_tree(&root);
    let index = SqliteIndex::open_in_memory().unwrap();
    let syncer = IndexSyncer::new(&index, PathFilter::default(), 2);

    syncer.run_full_index(&root).await.unwrap();
    let first = stored_paths(&index);
    syncer.run_full_index(&root).await.unwrap();

    assert_eq!(stored_paths(&index), first);
    assert_eq!(index.count_documents().unwrap(), 4);
}

/// A missing root is reported, not treated as empty.
#[tokio::test]
async fn test_missing_root_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let index = SqliteIndex::open_in_memory().unwrap();
    let syncer = IndexSyncer::new(&index, PathFilter::default(), 1);

    let result = syncer.run_update(&tmp.path().join("nope")).await;

    assert!(matches!(result, Err(Error::NotFound { .. })));
}

/// Conflicting extension lists are rejected up front.
#[test]
fn test_conflicting_filter_lists() {
    let result = FilterConfig::new(false, &["log"], &["txt"]);
    assert!(matches!(result, Err(Error::FilterConfig(_))));
}

/// An index kept inside the indexed tree never indexes itself.
#[tokio::test]
async fn test_index_dir_inside_root_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write_tree(&root);
    let mut config = config_for(&root, &root.join(".indexdir"), &[]);
    config.filter = FilterConfig::new::<&str>(true, &[], &[]).unwrap();

    let index = SqliteIndex::open_or_create(&config.index_dir).unwrap();
    let syncer = IndexSyncer::from_config(&index, &config);
    syncer.run_full_index(&config.root).await.unwrap();
    let report = syncer.run_update(&config.root).await.unwrap();

    let paths = stored_paths(&index);
    assert_eq!(paths.len(), 5);
    assert!(paths.iter().all(|p| !p.contains(".indexdir")));
    assert_eq!(report.added + report.changed, 0);
}
