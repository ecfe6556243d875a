//! Reading files into documents.

use std::path::Path;

use crate::storage::{system_time_to_nanos, Document};
use crate::{Error, Result};

/// Read a file into a [`Document`].
///
/// Invalid UTF-8 sequences are dropped. The modification time is sampled
/// after the content is read, so a file that changes in between is stored
/// with the newer timestamp.
///
/// # Errors
///
/// Returns `Error::Read` if the file cannot be read; callers skip the file.
pub async fn load(path: &Path) -> Result<Document> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::read(path, e))?;

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::read(path, e))?;
    let last_modified = metadata.modified().map_or(0, system_time_to_nanos);

    let path_str = path.to_string_lossy().into_owned();

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Loaded file");

    Ok(Document {
        title: path_str.clone(),
        path: path_str,
        content: decode_dropping_invalid(&bytes),
        last_modified,
    })
}

/// Decode UTF-8, skipping invalid byte sequences instead of replacing them.
#[must_use]
pub fn decode_dropping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());

    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let skip = e.error_len().unwrap_or(rest.len());
                bytes = &rest[skip..];
            }
        }
    }
}
