//! Index engine interface and its `SQLite` implementation.
//!
//! The synchronization code only talks to the [`IndexEngine`],
//! [`IndexWriter`] and [`IndexReader`] traits. Writers buffer mutations in
//! memory; [`IndexWriter::commit`] applies the whole buffer in one
//! transaction, so readers only ever observe committed state.

use std::mem;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use rusqlite::params;

use super::connection::Database;
use super::models::{now_unix, Document, IndexRecord, SearchHit};
use super::schema::{migrate, verify_schema, SCHEMA_VERSION};
use super::search::search_documents;
use crate::error::StorageError;
use crate::Result;

/// File name of the index database inside the index directory.
pub const INDEX_FILE: &str = "index.db";

/// A handle to an index.
pub trait IndexEngine: Send + Sync {
    type Writer: IndexWriter;
    type Reader: IndexReader;

    /// Start a writer session.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot accept writes.
    fn writer(&self) -> Result<Self::Writer>;

    /// Open a reader over committed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be read.
    fn reader(&self) -> Result<Self::Reader>;

    /// Release the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails to close cleanly.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Mutations against an index. Nothing is visible before `commit`.
pub trait IndexWriter: Send {
    /// Add a document. An existing document with the same path is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation cannot be recorded.
    fn add_document(&mut self, doc: Document) -> Result<()>;

    /// Delete the document stored under `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation cannot be recorded.
    fn delete_by_path(&mut self, path: &Path) -> Result<()>;

    /// Delete every document stored below the directory `dir`.
    ///
    /// A document stored under `dir` itself is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation cannot be recorded.
    fn delete_under(&mut self, dir: &Path) -> Result<()>;

    /// Discard every mutation since the last commit.
    fn rollback(&mut self);

    /// Publish every mutation since the last commit atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing fails; nothing is published then.
    fn commit(&mut self) -> Result<()>;
}

/// Read access to committed index state.
pub trait IndexReader {
    /// Every stored `(path, last_modified)` record.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be read.
    fn all_stored_records(&self) -> Result<Vec<IndexRecord>>;

    /// Ranked full-text search.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>>;
}

/// `SQLite` FTS5 index.
#[derive(Debug, Clone)]
pub struct SqliteIndex {
    db: Database,
}

impl SqliteIndex {
    /// Open the index in `dir`, creating the directory and schema if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open_or_create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            tracing::info!(path = %dir.display(), "Creating index directory");
            std::fs::create_dir_all(dir)?;
        }

        Self::init(Database::open(dir.join(INDEX_FILE))?)
    }

    /// Open a throwaway in-memory index.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Database::open_in_memory()?)
    }

    fn init(db: Database) -> Result<Self> {
        db.with_conn(|conn| {
            migrate(conn)?;
            verify_schema(conn)?;
            Ok(())
        })?;

        tracing::debug!(location = %db.location(), "Index opened, schema version {SCHEMA_VERSION}");
        Ok(Self { db })
    }

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_documents(&self) -> Result<i64> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                .map_err(|e| StorageError::from(e).into())
        })
    }

    /// The underlying database.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }
}

impl IndexEngine for SqliteIndex {
    type Writer = SqliteWriter;
    type Reader = SqliteReader;

    fn writer(&self) -> Result<SqliteWriter> {
        Ok(SqliteWriter {
            db: self.db.clone(),
            pending: Vec::new(),
        })
    }

    fn reader(&self) -> Result<SqliteReader> {
        Ok(SqliteReader {
            db: self.db.clone(),
        })
    }

    fn close(self) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(StorageError::from)?;
            Ok(())
        })?;
        tracing::debug!(location = %self.db.location(), "Index closed");
        Ok(())
    }
}

#[derive(Debug)]
enum Mutation {
    Add(Document),
    Delete(PathBuf),
    DeleteUnder(String),
}

/// Buffered writer session.
#[derive(Debug)]
pub struct SqliteWriter {
    db: Database,
    pending: Vec<Mutation>,
}

impl SqliteWriter {
    /// Number of mutations waiting for commit.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl IndexWriter for SqliteWriter {
    fn add_document(&mut self, doc: Document) -> Result<()> {
        self.pending.push(Mutation::Add(doc));
        Ok(())
    }

    fn delete_by_path(&mut self, path: &Path) -> Result<()> {
        self.pending.push(Mutation::Delete(path.to_path_buf()));
        Ok(())
    }

    fn delete_under(&mut self, dir: &Path) -> Result<()> {
        let mut prefix = dir.to_string_lossy().into_owned();
        if !prefix.ends_with(MAIN_SEPARATOR) {
            prefix.push(MAIN_SEPARATOR);
        }
        self.pending.push(Mutation::DeleteUnder(prefix));
        Ok(())
    }

    fn rollback(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(discarded = self.pending.len(), "Rolled back index batch");
            self.pending.clear();
        }
    }

    fn commit(&mut self) -> Result<()> {
        let batch = mem::take(&mut self.pending);
        if batch.is_empty() {
            tracing::debug!("Nothing to commit");
            return Ok(());
        }

        let now = now_unix();
        let count = batch.len();

        self.db.with_transaction(|conn| {
            let mut delete = conn
                .prepare_cached("DELETE FROM documents WHERE path = ?")
                .map_err(StorageError::from)?;
            let mut delete_prefix = conn
                .prepare_cached("DELETE FROM documents WHERE substr(path, 1, length(?1)) = ?1")
                .map_err(StorageError::from)?;
            let mut insert = conn
                .prepare_cached(
                    "INSERT INTO documents (path, title, content, last_modified, indexed_at)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .map_err(StorageError::from)?;

            for mutation in &batch {
                match mutation {
                    Mutation::Delete(path) => {
                        delete
                            .execute([path.to_string_lossy()])
                            .map_err(StorageError::from)?;
                    }
                    Mutation::DeleteUnder(prefix) => {
                        delete_prefix.execute([prefix]).map_err(StorageError::from)?;
                    }
                    Mutation::Add(doc) => {
                        delete.execute([&doc.path]).map_err(StorageError::from)?;
                        insert
                            .execute(params![
                                doc.path,
                                doc.title,
                                doc.content,
                                doc.last_modified,
                                now
                            ])
                            .map_err(StorageError::from)?;
                    }
                }
            }
            Ok(())
        })?;

        tracing::debug!(mutations = count, "Committed index batch");
        Ok(())
    }
}

/// Reader over committed state.
#[derive(Debug, Clone)]
pub struct SqliteReader {
    db: Database,
}

impl IndexReader for SqliteReader {
    fn all_stored_records(&self) -> Result<Vec<IndexRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT path, title, last_modified FROM documents ORDER BY path")
                .map_err(StorageError::from)?;

            let records = stmt
                .query_map([], |row| {
                    Ok(IndexRecord {
                        path: row.get(0)?,
                        title: row.get(1)?,
                        last_modified: row.get(2)?,
                    })
                })
                .map_err(StorageError::from)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(StorageError::from)?;

            Ok(records)
        })
    }

    fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        self.db.with_conn(|conn| search_documents(conn, query, limit))
    }
}
