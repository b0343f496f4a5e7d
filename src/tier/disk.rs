//! Durable cache tier: one file per call fingerprint.
//!
//! Entries live under a dedicated cache directory as
//! `<fingerprint hex>.json`, a versioned serialization of the value only —
//! mutation-guard fingerprints are memory-tier state and are recomputed on
//! read-through. Writes go to a temp file first and rename into place, so
//! a concurrent reader never observes a truncated entry; a failed write
//! removes its own temp file (best effort) before propagating the error.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{MuninnError, Result};
use crate::fingerprint::Digest;

/// Current on-disk entry format version.
const ENTRY_VERSION: u32 = 1;

/// File extension for persisted entries.
const ENTRY_EXTENSION: &str = "json";

/// Versioned payload wrapper for persisted entries.
#[derive(serde::Serialize, serde::Deserialize)]
struct PersistedEntry<V> {
    version: u32,
    value: V,
}

/// File-per-entry persistence under a dedicated cache directory.
pub struct DiskTier {
    root: PathBuf,
}

impl DiskTier {
    /// Create a tier rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default root: `<platform cache dir>/muninn`.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("muninn")
    }

    /// The cache directory this tier reads and writes.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &Digest) -> PathBuf {
        self.root
            .join(format!("{}.{ENTRY_EXTENSION}", key.to_hex()))
    }

    /// Read a persisted value.
    ///
    /// A missing file maps to [`MuninnError::KeyNotFound`]; anything else
    /// (I/O failure, corrupt JSON, newer format version) surfaces as its
    /// own error for the orchestrator to report.
    pub fn read<V: DeserializeOwned>(&self, key: &Digest) -> Result<V> {
        let path = self.entry_path(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = %key, "disk cache miss");
                return Err(MuninnError::KeyNotFound { tier: "disk" });
            }
            Err(e) => return Err(MuninnError::Io(e)),
        };
        let entry: PersistedEntry<V> = serde_json::from_str(&content)?;
        if entry.version > ENTRY_VERSION {
            return Err(MuninnError::UnsupportedVersion {
                found: entry.version,
                max: ENTRY_VERSION,
            });
        }
        debug!(key = %key, "disk cache hit");
        Ok(entry.value)
    }

    /// Persist a value, atomically (temp file + rename).
    ///
    /// On failure, any partially-written temp file is removed so a later
    /// read cannot trip over a truncated entry; the removal itself is best
    /// effort and never masks the original error.
    pub fn write<V: Serialize>(&self, key: &Digest, value: &V) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;

        let json = serde_json::to_string(&PersistedEntry {
            version: ENTRY_VERSION,
            value,
        })?;

        let path = self.entry_path(key);
        let tmp_path = path.with_extension(format!("{ENTRY_EXTENSION}.tmp"));
        let started = Instant::now();
        let written = std::fs::write(&tmp_path, &json)
            .and_then(|()| std::fs::rename(&tmp_path, &path));
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), error = %cleanup, "failed to clean up partial cache file");
                }
            }
            return Err(MuninnError::Io(e));
        }
        debug!(
            key = %key,
            bytes = json.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "persisted cache entry"
        );
        Ok(())
    }

    /// Remove the entire cache directory.
    ///
    /// Returns whether a directory existed and was removed. A removal
    /// failure is logged and reported as `false`.
    pub fn clear_all(&self) -> bool {
        if !self.root.is_dir() {
            return false;
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!(path = %self.root.display(), "removed disk cache directory");
                true
            }
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "failed to remove disk cache directory");
                false
            }
        }
    }
}

/// Monomorphized disk accessors for a cached function's value type.
///
/// Captured by the entry-point builder when (and only when) persistence is
/// requested, which is what keeps `Serialize`/`DeserializeOwned` bounds off
/// functions that never touch the disk tier.
pub(crate) struct DiskCodec<V> {
    pub read: fn(&DiskTier, &Digest) -> Result<V>,
    pub write: fn(&DiskTier, &Digest, &V) -> Result<()>,
}

impl<V: Serialize + DeserializeOwned> DiskCodec<V> {
    pub(crate) fn new() -> Self {
        Self {
            read: DiskTier::read::<V>,
            write: DiskTier::write::<V>,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    fn key(n: u8) -> Digest {
        fingerprint(&n, None).unwrap()
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::new(dir.path().join("cache"));

        let value = vec!["a".to_string(), "b".to_string()];
        tier.write(&key(1), &value).unwrap();
        let loaded: Vec<String> = tier.read(&key(1)).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::new(dir.path().join("cache"));
        let err = tier.read::<u32>(&key(1)).unwrap_err();
        assert!(matches!(err, MuninnError::KeyNotFound { tier: "disk" }));
    }

    #[test]
    fn file_named_by_fingerprint_hex() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::new(dir.path().join("cache"));
        tier.write(&key(1), &7u32).unwrap();

        let expected = dir
            .path()
            .join("cache")
            .join(format!("{}.json", key(1).to_hex()));
        assert!(expected.is_file());
    }

    #[test]
    fn corrupt_entry_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::new(dir.path().join("cache"));
        tier.write(&key(1), &7u32).unwrap();

        let path = dir
            .path()
            .join("cache")
            .join(format!("{}.json", key(1).to_hex()));
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            tier.read::<u32>(&key(1)).unwrap_err(),
            MuninnError::Serialization(_)
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::new(dir.path().join("cache"));

        std::fs::create_dir_all(tier.root()).unwrap();
        let path = tier.root().join(format!("{}.json", key(1).to_hex()));
        std::fs::write(&path, r#"{"version":99,"value":7}"#).unwrap();

        assert!(matches!(
            tier.read::<u32>(&key(1)).unwrap_err(),
            MuninnError::UnsupportedVersion { found: 99, .. }
        ));
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::new(dir.path().join("cache"));
        tier.write(&key(1), &7u32).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(tier.root())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn clear_all_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::new(dir.path().join("cache"));

        assert!(!tier.clear_all(), "nothing to remove yet");

        tier.write(&key(1), &7u32).unwrap();
        assert!(tier.clear_all());
        assert!(!tier.root().exists());
        assert!(!tier.clear_all(), "second clear finds nothing");
    }
}
