//! Path filtering with gitignore support.
//!
//! Decides which paths are excluded from indexing: configured patterns,
//! the project's `.gitignore`, anything outside the project root, and the
//! index's own storage directory.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::{Error, Result};

/// Ignore-rule evaluator for one project root.
#[derive(Debug)]
pub struct IgnoreMatcher {
    root: PathBuf,
    index_dir: PathBuf,
    rules: Gitignore,
}

impl IgnoreMatcher {
    /// Build a matcher for a project root.
    ///
    /// Configured patterns are added first, then the root's `.gitignore`
    /// when present. An unreadable `.gitignore` is logged and treated as
    /// contributing no rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be resolved or a configured
    /// pattern is invalid.
    pub fn new(
        root: impl AsRef<Path>,
        index_dir: impl AsRef<Path>,
        patterns: &[String],
    ) -> Result<Self> {
        let root = root
            .as_ref()
            .canonicalize()
            .map_err(|e| Error::config(format!("cannot resolve project root: {e}")))?;

        // The index dir may not exist yet; resolve what can be resolved
        let index_dir = canonicalize_lenient(index_dir.as_ref());

        let mut builder = GitignoreBuilder::new(&root);

        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| Error::config(format!("invalid ignore pattern '{pattern}': {e}")))?;
        }

        let gitignore_path = root.join(".gitignore");
        if gitignore_path.is_file() {
            if let Some(e) = builder.add(&gitignore_path) {
                tracing::error!(
                    path = %gitignore_path.display(),
                    error = %e,
                    "Error reading .gitignore; continuing without it"
                );
            }
        }

        let rules = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build ignore rules: {e}")))?;

        Ok(Self {
            root,
            index_dir,
            rules,
        })
    }

    /// Check whether a file path is excluded from indexing.
    ///
    /// Always true for directories, for paths resolving outside the project
    /// root, and for anything under the index storage directory.
    #[must_use]
    pub fn should_ignore(&self, path: &Path) -> bool {
        let resolved = canonicalize_lenient(path);

        if resolved.is_dir() {
            return true;
        }

        let Ok(relative) = resolved.strip_prefix(&self.root) else {
            // Outside the project root
            return true;
        };

        if resolved.starts_with(&self.index_dir) {
            return true;
        }

        self.rules.matched(relative, false).is_ignore()
    }

    /// Check whether a directory subtree can be skipped entirely.
    ///
    /// Used by the full scan to prune walks; the index directory is always
    /// pruned.
    #[must_use]
    pub fn is_ignored_dir(&self, path: &Path) -> bool {
        let resolved = canonicalize_lenient(path);

        let Ok(relative) = resolved.strip_prefix(&self.root) else {
            return true;
        };

        if relative.as_os_str().is_empty() {
            // The root itself is never pruned
            return false;
        }

        if resolved.starts_with(&self.index_dir) {
            return true;
        }

        self.rules.matched(relative, true).is_ignore()
    }

    /// The canonical project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Canonicalize where possible; fall back to resolving the nearest existing
/// ancestor so paths to deleted or not-yet-created files still normalize.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(parent) = parent.canonicalize() {
            return parent.join(name);
        }
    }

    path.to_path_buf()
}
