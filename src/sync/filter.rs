//! Path eligibility for indexing and traversal.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Which file extensions are eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExtensionRule {
    /// Every extension is eligible.
    #[default]
    Any,
    /// Listed extensions are rejected.
    Exclude(BTreeSet<String>),
    /// Only listed extensions are eligible.
    Include(BTreeSet<String>),
}

/// Immutable filter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    include_hidden: bool,
    extensions: ExtensionRule,
}

impl FilterConfig {
    /// Build a filter configuration.
    ///
    /// Extensions may be given with or without a leading dot. An empty list
    /// counts as not set.
    ///
    /// # Errors
    ///
    /// Returns `Error::FilterConfig` if both `exclude` and `include` are set.
    pub fn new<S: AsRef<str>>(include_hidden: bool, exclude: &[S], include: &[S]) -> Result<Self> {
        let exclude = normalize_extensions(exclude);
        let include = normalize_extensions(include);

        let extensions = match (exclude.is_empty(), include.is_empty()) {
            (true, true) => ExtensionRule::Any,
            (false, true) => ExtensionRule::Exclude(exclude),
            (true, false) => ExtensionRule::Include(include),
            (false, false) => {
                return Err(Error::filter_config(
                    "exclude and include extension lists are mutually exclusive",
                ))
            }
        };

        Ok(Self {
            include_hidden,
            extensions,
        })
    }

    /// Whether hidden files and directories are eligible.
    #[must_use]
    pub const fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    /// The extension rule.
    #[must_use]
    pub const fn extensions(&self) -> &ExtensionRule {
        &self.extensions
    }
}

fn normalize_extensions<S: AsRef<str>>(raw: &[S]) -> BTreeSet<String> {
    raw.iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Pure predicate over paths, built from a [`FilterConfig`].
///
/// Directories registered with [`ignoring`](Self::ignoring) are rejected
/// along with everything below them, whatever the configuration says.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    config: FilterConfig,
    ignored: Vec<PathBuf>,
}

impl PathFilter {
    /// Create a filter.
    #[must_use]
    pub const fn new(config: FilterConfig) -> Self {
        Self {
            config,
            ignored: Vec::new(),
        }
    }

    /// Also reject `dir` and its whole subtree.
    #[must_use]
    pub fn ignoring(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ignored.push(dir.into());
        self
    }

    /// Whether `path` is an ignored directory or lies below one.
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.iter().any(|dir| path.starts_with(dir))
    }

    /// The configuration this filter was built from.
    #[must_use]
    pub const fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Check if a file should be indexed.
    ///
    /// Only the path's text is inspected, never the filesystem.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        if self.is_ignored(path) || self.is_hidden_rejected(path) {
            return false;
        }

        let ext = extension_of(path);
        match &self.config.extensions {
            ExtensionRule::Any => true,
            ExtensionRule::Exclude(set) => !ext.is_some_and(|e| set.contains(e)),
            ExtensionRule::Include(set) => ext.is_some_and(|e| set.contains(e)),
        }
    }

    /// Check if a directory should be descended into.
    ///
    /// The include rule does not apply to directories.
    #[must_use]
    pub fn accepts_dir(&self, path: &Path) -> bool {
        if self.is_ignored(path) || self.is_hidden_rejected(path) {
            return false;
        }

        match &self.config.extensions {
            ExtensionRule::Exclude(set) => !extension_of(path).is_some_and(|e| set.contains(e)),
            ExtensionRule::Any | ExtensionRule::Include(_) => true,
        }
    }

    /// Check a file reported somewhere below `root`.
    ///
    /// Besides [`accepts`](Self::accepts), rejects the path if any directory
    /// between `root` and the file would have been pruned by traversal.
    #[must_use]
    pub fn accepts_under(&self, root: &Path, path: &Path) -> bool {
        self.accepts(path) && self.parents_accepted(root, path)
    }

    /// Directory counterpart of [`accepts_under`](Self::accepts_under).
    #[must_use]
    pub fn accepts_dir_under(&self, root: &Path, path: &Path) -> bool {
        self.accepts_dir(path) && self.parents_accepted(root, path)
    }

    fn parents_accepted(&self, root: &Path, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(root) else {
            return true;
        };

        let Some(parent) = rel.parent() else {
            return true;
        };

        let mut dir = root.to_path_buf();
        for component in parent.components() {
            if let Component::Normal(name) = component {
                dir.push(name);
                if !self.accepts_dir(&dir) {
                    return false;
                }
            }
        }

        true
    }

    fn is_hidden_rejected(&self, path: &Path) -> bool {
        !self.config.include_hidden && is_hidden(path)
    }
}

/// Whether the base name of `path` starts with a dot.
#[must_use]
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}
