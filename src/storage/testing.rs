//! Index engine wrapper that records every call, for tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::engine::{IndexEngine, IndexWriter, SqliteIndex, SqliteReader, SqliteWriter};
use super::models::Document;
use crate::error::StorageError;
use crate::Result;

/// One recorded writer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Add(String),
    Delete(String),
    DeleteUnder(String),
    Rollback,
    Commit,
}

/// A real in-memory index whose writer calls are logged.
#[derive(Debug, Clone)]
pub struct RecordingIndex {
    inner: SqliteIndex,
    ops: Arc<Mutex<Vec<Op>>>,
    fail_commits: Arc<AtomicBool>,
    fail_adds: Arc<AtomicBool>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self {
            inner: SqliteIndex::open_in_memory().unwrap(),
            ops: Arc::default(),
            fail_commits: Arc::default(),
            fail_adds: Arc::default(),
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().clear();
    }

    pub fn commits(&self) -> usize {
        self.ops().iter().filter(|op| **op == Op::Commit).count()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_adds(&self, fail: bool) {
        self.fail_adds.store(fail, Ordering::SeqCst);
    }

    pub const fn inner(&self) -> &SqliteIndex {
        &self.inner
    }
}

impl IndexEngine for RecordingIndex {
    type Writer = RecordingWriter;
    type Reader = SqliteReader;

    fn writer(&self) -> Result<RecordingWriter> {
        Ok(RecordingWriter {
            inner: self.inner.writer()?,
            ops: Arc::clone(&self.ops),
            fail_commits: Arc::clone(&self.fail_commits),
            fail_adds: Arc::clone(&self.fail_adds),
        })
    }

    fn reader(&self) -> Result<SqliteReader> {
        self.inner.reader()
    }

    fn close(self) -> Result<()> {
        self.inner.close()
    }
}

#[derive(Debug)]
pub struct RecordingWriter {
    inner: SqliteWriter,
    ops: Arc<Mutex<Vec<Op>>>,
    fail_commits: Arc<AtomicBool>,
    fail_adds: Arc<AtomicBool>,
}

impl IndexWriter for RecordingWriter {
    fn add_document(&mut self, doc: Document) -> Result<()> {
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(StorageError::Database("index is read-only".to_string()).into());
        }
        self.ops.lock().push(Op::Add(doc.path.clone()));
        self.inner.add_document(doc)
    }

    fn delete_by_path(&mut self, path: &Path) -> Result<()> {
        self.ops
            .lock()
            .push(Op::Delete(path.to_string_lossy().into_owned()));
        self.inner.delete_by_path(path)
    }

    fn delete_under(&mut self, dir: &Path) -> Result<()> {
        self.ops
            .lock()
            .push(Op::DeleteUnder(dir.to_string_lossy().into_owned()));
        self.inner.delete_under(dir)
    }

    fn rollback(&mut self) {
        self.ops.lock().push(Op::Rollback);
        self.inner.rollback();
    }

    fn commit(&mut self) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::Database("disk full".to_string()).into());
        }
        self.ops.lock().push(Op::Commit);
        self.inner.commit()
    }
}
