//! Index schema and its versioned migrations.

use rusqlite::{params, Connection, OptionalExtension};

use super::models::now_unix;
use crate::error::StorageError;
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

/// Documents plus an external-content FTS5 table kept in step by triggers.
const V1_DOCUMENTS: &str = r"
    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        last_modified INTEGER NOT NULL,
        indexed_at INTEGER NOT NULL
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
        title,
        content,
        content='documents',
        content_rowid='id'
    );

    CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
        INSERT INTO documents_fts(rowid, title, content)
        VALUES (new.id, new.title, new.content);
    END;

    CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
        INSERT INTO documents_fts(documents_fts, rowid, title, content)
        VALUES ('delete', old.id, old.title, old.content);
    END;

    CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents BEGIN
        INSERT INTO documents_fts(documents_fts, rowid, title, content)
        VALUES ('delete', old.id, old.title, old.content);
        INSERT INTO documents_fts(rowid, title, content)
        VALUES (new.id, new.title, new.content);
    END;
";

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "documents and full-text index",
    sql: V1_DOCUMENTS,
}];

const REQUIRED_TABLES: [&str; 3] = ["documents", "documents_fts", "schema_migrations"];

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// # Errors
///
/// Returns `StorageError::Migration` if a step fails, or if the index was
/// written by a newer version.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )
    .map_err(|e| StorageError::Migration(format!("failed to create migrations table: {e}")))?;

    let current = current_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(StorageError::Migration(format!(
            "index schema v{current} is newer than supported v{SCHEMA_VERSION}"
        ))
        .into());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(
            version = migration.version,
            "Applying index migration: {}",
            migration.description
        );

        conn.execute_batch(migration.sql).map_err(|e| {
            StorageError::Migration(format!("v{} failed: {e}", migration.version))
        })?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![migration.version, now_unix()],
        )
        .map_err(|e| StorageError::Migration(format!("failed to record v{}: {e}", migration.version)))?;
    }

    Ok(())
}

fn current_version(conn: &Connection) -> Result<i32> {
    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
        .optional()
        .map_err(|e| StorageError::Migration(format!("failed to read schema version: {e}")))?
        .flatten();

    Ok(version.unwrap_or(0))
}

/// Check that every table the index relies on exists.
///
/// # Errors
///
/// Returns `StorageError::Migration` naming the first missing table.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    for table in REQUIRED_TABLES {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;

        if found.is_none() {
            return Err(StorageError::Migration(format!("missing table '{table}'")).into());
        }
    }
    Ok(())
}
