//! Full-text index storage.
//!
//! This module provides:
//! - The index engine traits the synchronization code is written against
//! - A `SQLite` FTS5 implementation with versioned schema migrations
//! - Ranked search with highlight spans

mod connection;
mod engine;
mod models;
mod schema;
mod search;
#[cfg(test)]
pub(crate) mod testing;

pub use connection::{Database, Location};
pub use engine::{
    IndexEngine, IndexReader, IndexWriter, SqliteIndex, SqliteReader, SqliteWriter, INDEX_FILE,
};
pub use models::{
    nanos_to_datetime, system_time_to_nanos, Document, HighlightSpan, IndexRecord, SearchHit,
};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use search::{build_match_expression, search_documents};
