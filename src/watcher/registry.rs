//! Change registry: content-identity based change detection.
//!
//! Tracks a fingerprint (content hash + modification time) per known file.
//! The registry, not raw file events, is the source of truth for "did this
//! file actually change".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

/// Fingerprint identifying a file's last-indexed version.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFingerprint {
    /// blake3 hex digest of the file bytes.
    pub content_hash: String,
    /// Modification time, unix seconds.
    pub modified_at: f64,
}

/// Verdict of the change decision for a path.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeVerdict {
    /// Hash and mtime both match the stored fingerprint.
    Unchanged,
    /// Known file whose content or mtime differs; carries the fresh
    /// fingerprint so the caller doesn't hash twice.
    NeedsIndex(FileFingerprint),
    /// File not previously known; carries the fresh fingerprint.
    Unknown(FileFingerprint),
    /// Fingerprinting failed (file vanished or unreadable).
    Failed,
}

/// In-memory map of previously-seen files to their fingerprints.
///
/// Safe for concurrent access; overlapping writers (scan vs. watch loop)
/// are last-write-wins per path.
#[derive(Debug, Default)]
pub struct ChangeRegistry {
    files: RwLock<HashMap<PathBuf, FileFingerprint>>,
}

impl ChangeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a path needs re-indexing.
    ///
    /// Computes the current fingerprint and compares BOTH content hash and
    /// modification time against the stored one; both must match for
    /// `Unchanged`.
    #[must_use]
    pub fn decide(&self, path: &Path) -> ChangeVerdict {
        let current = match fingerprint_file(path) {
            Ok(fp) => fp,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to fingerprint file");
                return ChangeVerdict::Failed;
            }
        };

        let files = self.files.read();
        match files.get(path) {
            None => ChangeVerdict::Unknown(current),
            Some(known)
                if known.content_hash == current.content_hash
                    && known.modified_at.to_bits() == current.modified_at.to_bits() =>
            {
                ChangeVerdict::Unchanged
            }
            Some(_) => ChangeVerdict::NeedsIndex(current),
        }
    }

    /// Record a file's fingerprint after successful processing.
    pub fn record(&self, path: impl Into<PathBuf>, fingerprint: FileFingerprint) {
        self.files.write().insert(path.into(), fingerprint);
    }

    /// Remove a file from the registry. Returns true if it was known.
    pub fn forget(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Check whether a path is known.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    /// Number of tracked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    /// Drop every fingerprint (forced re-index).
    pub fn clear(&self) {
        self.files.write().clear();
    }
}

/// Compute the current fingerprint of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or its metadata queried.
pub fn fingerprint_file(path: &Path) -> std::io::Result<FileFingerprint> {
    let bytes = std::fs::read(path)?;
    let content_hash = blake3::hash(&bytes).to_hex().to_string();

    let modified_at = std::fs::metadata(path)?
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    Ok(FileFingerprint {
        content_hash,
        modified_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let registry = ChangeRegistry::new();
        assert!(matches!(registry.decide(&path), ChangeVerdict::Unknown(_)));
    }

    #[test]
    fn test_unchanged_after_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let registry = ChangeRegistry::new();
        let fp = fingerprint_file(&path).unwrap();
        registry.record(&path, fp);

        assert_eq!(registry.decide(&path), ChangeVerdict::Unchanged);
    }

    #[test]
    fn test_content_change_needs_index() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let registry = ChangeRegistry::new();
        registry.record(&path, fingerprint_file(&path).unwrap());

        fs::write(&path, "changed").unwrap();
        assert!(matches!(
            registry.decide(&path),
            ChangeVerdict::NeedsIndex(_)
        ));
    }

    #[test]
    fn test_mtime_only_change_needs_index() {
        // Identical bytes, different recorded mtime: both hash AND mtime
        // must match, so this is NeedsIndex
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let registry = ChangeRegistry::new();
        let mut fp = fingerprint_file(&path).unwrap();
        fp.modified_at -= 10.0;
        registry.record(&path, fp);

        assert!(matches!(
            registry.decide(&path),
            ChangeVerdict::NeedsIndex(_)
        ));
    }

    #[test]
    fn test_hash_only_change_needs_index() {
        // Same mtime on record, different stored hash
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let registry = ChangeRegistry::new();
        let mut fp = fingerprint_file(&path).unwrap();
        fp.content_hash = "0".repeat(64);
        registry.record(&path, fp);

        assert!(matches!(
            registry.decide(&path),
            ChangeVerdict::NeedsIndex(_)
        ));
    }

    #[test]
    fn test_vanished_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.txt");

        let registry = ChangeRegistry::new();
        assert_eq!(registry.decide(&path), ChangeVerdict::Failed);
    }

    #[test]
    fn test_forget() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let registry = ChangeRegistry::new();
        registry.record(&path, fingerprint_file(&path).unwrap());
        assert!(registry.contains(&path));

        assert!(registry.forget(&path));
        assert!(!registry.contains(&path));
        assert!(!registry.forget(&path));
    }

    #[test]
    fn test_clear() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let registry = ChangeRegistry::new();
        registry.record(&path, fingerprint_file(&path).unwrap());
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_fingerprint_is_content_addressed() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.txt");
        let b = tmp.path().join("b.txt");
        fs::write(&a, "same bytes").unwrap();
        fs::write(&b, "same bytes").unwrap();

        let fp_a = fingerprint_file(&a).unwrap();
        let fp_b = fingerprint_file(&b).unwrap();
        assert_eq!(fp_a.content_hash, fp_b.content_hash);
        assert_eq!(fp_a.content_hash.len(), 64);
    }
}
