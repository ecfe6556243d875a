//! File system event types and classification.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind, RenameMode};

/// A live filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File was created.
    Created(PathBuf),
    /// File content or metadata changed.
    Modified(PathBuf),
    /// File was deleted.
    Deleted(PathBuf),
    /// File was renamed from one path to another.
    Moved { from: PathBuf, to: PathBuf },
}

impl WatchEvent {
    /// The path whose index entry this event decides.
    ///
    /// For a move this is the destination.
    #[must_use]
    pub fn affected_path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => p,
            Self::Moved { to, .. } => to,
        }
    }

    /// Classify a raw notification.
    ///
    /// Access events yield nothing. Ambiguous kinds are resolved by checking
    /// whether the path still exists.
    #[must_use]
    pub fn from_notify(event: &notify::Event) -> Vec<Self> {
        let paths = &event.paths;

        match event.kind {
            EventKind::Access(_) => Vec::new(),
            EventKind::Create(_) => paths.iter().cloned().map(Self::Created).collect(),
            EventKind::Remove(_) => paths.iter().cloned().map(Self::Deleted).collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths.as_slice() {
                [from, to, ..] => vec![Self::Moved {
                    from: from.clone(),
                    to: to.clone(),
                }],
                _ => paths.iter().map(|p| Self::by_existence(p, Self::Created)).collect(),
            },
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                paths.iter().cloned().map(Self::Deleted).collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                paths.iter().cloned().map(Self::Created).collect()
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                paths.iter().map(|p| Self::by_existence(p, Self::Created)).collect()
            }
            EventKind::Modify(_) => paths.iter().cloned().map(Self::Modified).collect(),
            EventKind::Any | EventKind::Other => {
                paths.iter().map(|p| Self::by_existence(p, Self::Modified)).collect()
            }
        }
    }

    fn by_existence(path: &Path, present: fn(PathBuf) -> Self) -> Self {
        if path.exists() {
            present(path.to_path_buf())
        } else {
            Self::Deleted(path.to_path_buf())
        }
    }
}
