//! Full-text search over indexed documents.
//!
//! User text is turned into an FTS5 expression where every term is quoted,
//! so punctuation in the query can never be parsed as FTS5 syntax. Results
//! are ranked by `bm25` and carry a snippet with highlight spans.

use rusqlite::Connection;

use super::models::{HighlightSpan, SearchHit};
use crate::error::StorageError;
use crate::Result;

/// Marker FTS5 puts before a matched term in a snippet.
const MATCH_OPEN: char = '\u{2}';
/// Marker FTS5 puts after a matched term in a snippet.
const MATCH_CLOSE: char = '\u{3}';

/// Tokens of context around each match.
const SNIPPET_TOKENS: i64 = 20;

/// Build an FTS5 `MATCH` expression from free text.
///
/// Returns `None` if the text has no terms.
#[must_use]
pub fn build_match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Search documents, best match first.
///
/// `limit` of `None` returns every match.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn search_documents(
    conn: &Connection,
    text: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchHit>> {
    let Some(expression) = build_match_expression(text) else {
        return Ok(Vec::new());
    };

    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let mut stmt = conn
        .prepare(
            "SELECT d.path, d.title, d.last_modified, bm25(documents_fts),
                    snippet(documents_fts, -1, ?1, ?2, '...', ?3)
             FROM documents_fts
             JOIN documents d ON d.id = documents_fts.rowid
             WHERE documents_fts MATCH ?4
             ORDER BY bm25(documents_fts)
             LIMIT ?5",
        )
        .map_err(|e| StorageError::Query(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::params![
                MATCH_OPEN.to_string(),
                MATCH_CLOSE.to_string(),
                SNIPPET_TOKENS,
                expression,
                limit
            ],
            |row| {
                let rank: f64 = row.get(3)?;
                let raw_snippet: String = row.get(4)?;
                let (snippet, highlights) = parse_snippet(&raw_snippet);
                Ok(SearchHit {
                    path: row.get(0)?,
                    title: row.get(1)?,
                    last_modified: row.get(2)?,
                    score: -rank,
                    snippet,
                    highlights,
                })
            },
        )
        .map_err(|e| StorageError::Query(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Query(e.to_string()))?;

    tracing::debug!(query = %text, hits = rows.len(), "Search complete");
    Ok(rows)
}

/// Strip match markers from a snippet, recording their byte ranges.
fn parse_snippet(raw: &str) -> (String, Vec<HighlightSpan>) {
    let mut text = String::with_capacity(raw.len());
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;

    for ch in raw.chars() {
        match ch {
            MATCH_OPEN => open = Some(text.len()),
            MATCH_CLOSE => {
                if let Some(start) = open.take() {
                    spans.push(HighlightSpan {
                        start,
                        end: text.len(),
                    });
                }
            }
            _ => text.push(ch),
        }
    }

    (text, spans)
}
