//! Fingerprint cache with pluggable persistence.
//!
//! The cache keeps the last successful fingerprint of every local source in
//! memory. A [`FingerprintBackend`] mirrors it so that a restarted process
//! does not treat every source as changed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};
use crate::fingerprint::Fingerprint;

/// Persistence for per-source fingerprints.
pub trait FingerprintBackend: Send + Sync {
    /// Load the stored fingerprint for `name`, if any.
    fn load(&self, name: &str) -> Result<Option<Fingerprint>, SyncError>;

    /// Store `fingerprint` for `name`.
    fn save(&self, name: &str, fingerprint: &Fingerprint) -> Result<(), SyncError>;
}

/// On-disk marker payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FingerprintMarker {
    pub fingerprint: Fingerprint,
    pub synced_at: DateTime<Utc>,
}

/// One JSON marker per source at `<dir>/<name>.fingerprint.json`.
///
/// Writes go to `<path>.tmp` and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Marker location for `name`.
    pub fn marker_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.fingerprint.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FingerprintBackend for FileBackend {
    fn load(&self, name: &str) -> Result<Option<Fingerprint>, SyncError> {
        let path = self.marker_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let marker: FingerprintMarker = serde_json::from_str(&contents)?;
        Ok(Some(marker.fingerprint))
    }

    fn save(&self, name: &str, fingerprint: &Fingerprint) -> Result<(), SyncError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;

        let marker = FingerprintMarker {
            fingerprint: fingerprint.clone(),
            synced_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&marker)?;

        let path = self.marker_path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(())
    }
}

/// Process-local backend: nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Fingerprint>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintBackend for MemoryBackend {
    fn load(&self, name: &str) -> Result<Option<Fingerprint>, SyncError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(name).cloned())
    }

    fn save(&self, name: &str, fingerprint: &Fingerprint) -> Result<(), SyncError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(name.to_string(), fingerprint.clone());
        Ok(())
    }
}

/// In-memory fingerprint map backed by a [`FingerprintBackend`].
pub struct FingerprintCache {
    memory: RwLock<HashMap<String, Fingerprint>>,
    backend: Box<dyn FingerprintBackend>,
}

impl FingerprintCache {
    pub fn new(backend: impl FingerprintBackend + 'static) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            backend: Box::new(backend),
        }
    }

    /// Cache without persistence.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Last known fingerprint for `name`.
    ///
    /// Falls back to the backend on a cold cache. An unreadable marker is
    /// treated as absent, which makes the source count as changed.
    pub fn get(&self, name: &str) -> Option<Fingerprint> {
        if let Some(hit) = self
            .memory
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Some(hit.clone());
        }

        match self.backend.load(name) {
            Ok(Some(stored)) => {
                self.memory
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(name.to_string(), stored.clone());
                Some(stored)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable fingerprint marker for {}: {}", name, e);
                None
            }
        }
    }

    /// Record `fingerprint` for `name` in memory and in the backend.
    pub fn put(&self, name: &str, fingerprint: Fingerprint) -> Result<(), SyncError> {
        self.backend.save(name, &fingerprint)?;
        self.memory
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), fingerprint);
        Ok(())
    }
}

impl std::fmt::Debug for FingerprintCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let memory = self.memory.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("FingerprintCache")
            .field("entries", &memory.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_backend_missing_marker_is_none() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::new(temp.path());
        assert!(backend.load("docs").unwrap().is_none());
    }

    #[test]
    fn file_backend_roundtrip_leaves_no_tmp() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::new(temp.path().join("state"));
        let fp = Fingerprint::new("abc123");

        backend.save("docs", &fp).unwrap();

        assert_eq!(backend.load("docs").unwrap(), Some(fp));
        assert!(!backend
            .marker_path("docs")
            .with_extension("json.tmp")
            .exists());
    }

    #[test]
    fn cold_cache_reads_through_to_disk() {
        let temp = tempdir().unwrap();
        FileBackend::new(temp.path())
            .save("docs", &Fingerprint::new("from-disk"))
            .unwrap();

        let cache = FingerprintCache::new(FileBackend::new(temp.path()));

        assert_eq!(cache.get("docs"), Some(Fingerprint::new("from-disk")));
        assert_eq!(cache.get("other"), None);
    }

    #[test]
    fn put_updates_memory_and_backend() {
        let temp = tempdir().unwrap();
        let cache = FingerprintCache::new(FileBackend::new(temp.path()));

        cache.put("docs", Fingerprint::new("v2")).unwrap();

        assert_eq!(cache.get("docs"), Some(Fingerprint::new("v2")));
        let reloaded = FingerprintCache::new(FileBackend::new(temp.path()));
        assert_eq!(reloaded.get("docs"), Some(Fingerprint::new("v2")));
    }

    #[test]
    fn corrupt_marker_counts_as_absent() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::new(temp.path());
        fs::write(backend.marker_path("docs"), "not json").unwrap();

        let cache = FingerprintCache::new(backend);

        assert_eq!(cache.get("docs"), None);
    }
}
