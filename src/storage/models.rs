//! Data models for index operations.
//!
//! This module defines the core data structures used for:
//! - Documents handed to the index writer
//! - Stored records read back for reconciliation
//! - Search hits with highlight spans

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Get current Unix timestamp in seconds.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(0))
        .unwrap_or(0)
}

/// Convert a filesystem timestamp to nanoseconds since the Unix epoch.
///
/// Saturates at `i64::MAX` / `-i64::MAX` (roughly the years 1678..2262).
#[must_use]
pub fn system_time_to_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}

/// Render a stored timestamp.
#[must_use]
pub fn nanos_to_datetime(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

/// A file materialized for indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Display title (the path as opened).
    pub title: String,

    /// Full path to the source file; the index's unique key.
    pub path: String,

    /// Decoded text content.
    pub content: String,

    /// Modification time sampled when the file was read, in nanoseconds.
    pub last_modified: i64,
}

/// A stored `(path, last_modified)` record observed from the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub path: String,
    pub title: String,
    pub last_modified: i64,
}

/// Byte range of a highlighted match inside a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Path of the matching document.
    pub path: String,

    /// Title of the matching document.
    pub title: String,

    /// Stored modification time, in nanoseconds.
    pub last_modified: i64,

    /// Relevance, higher is better.
    pub score: f64,

    /// Context around the best match.
    pub snippet: String,

    /// Matched terms inside `snippet`.
    pub highlights: Vec<HighlightSpan>,
}

impl SearchHit {
    /// The snippet with every highlight wrapped in `open` and `close`.
    #[must_use]
    pub fn marked_snippet(&self, open: &str, close: &str) -> String {
        let mut out = String::with_capacity(self.snippet.len());
        let mut cursor = 0;

        for span in &self.highlights {
            let (Some(before), Some(term)) = (
                self.snippet.get(cursor..span.start),
                self.snippet.get(span.start..span.end),
            ) else {
                continue;
            };
            out.push_str(before);
            out.push_str(open);
            out.push_str(term);
            out.push_str(close);
            cursor = span.end;
        }

        out.push_str(self.snippet.get(cursor..).unwrap_or_default());
        out
    }
}
