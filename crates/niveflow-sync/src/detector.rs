//! Change detection for documentation sources.

use std::path::Path;
use std::sync::Arc;

use crate::error::SyncError;
use crate::fingerprint::{fingerprint_dir, Fingerprint};
use crate::store::FingerprintCache;

/// What a change decision was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvidence {
    /// Content fingerprint of a local directory
    Content(Fingerprint),

    /// Number of files a pull brought in
    Incoming(usize),

    /// The staging clone did not exist before this sync
    FirstClone,
}

/// Outcome of one detection for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub changed: bool,
    pub evidence: ChangeEvidence,
}

impl ChangeRecord {
    /// A source that has nothing new.
    pub fn unchanged(evidence: ChangeEvidence) -> Self {
        Self {
            changed: false,
            evidence,
        }
    }

    /// Decide for a remote source from the result of a clone or pull.
    pub fn from_remote(first_clone: bool, incoming: usize) -> Self {
        if first_clone {
            Self {
                changed: true,
                evidence: ChangeEvidence::FirstClone,
            }
        } else {
            Self {
                changed: incoming > 0,
                evidence: ChangeEvidence::Incoming(incoming),
            }
        }
    }
}

/// Decides whether a source changed since its last successful sync.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    cache: Arc<FingerprintCache>,
}

impl ChangeDetector {
    pub fn new(cache: Arc<FingerprintCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<FingerprintCache> {
        &self.cache
    }

    /// Fingerprint `path` and compare it with the cached value for `name`.
    ///
    /// Leaves the cache untouched; see [`ChangeDetector::commit`].
    pub fn inspect(&self, name: &str, path: &Path) -> Result<ChangeRecord, SyncError> {
        if !path.exists() {
            return Err(SyncError::MissingPath {
                name: name.to_string(),
                path: path.to_path_buf(),
            });
        }

        let current = fingerprint_dir(path)?;
        let changed = self.cache.get(name).as_ref() != Some(&current);

        Ok(ChangeRecord {
            changed,
            evidence: ChangeEvidence::Content(current),
        })
    }

    /// Store the fingerprint carried by `record` as the latest for `name`.
    ///
    /// Remote evidence carries no fingerprint and is ignored.
    pub fn commit(&self, name: &str, record: &ChangeRecord) -> Result<(), SyncError> {
        if let ChangeEvidence::Content(fingerprint) = &record.evidence {
            self.cache.put(name, fingerprint.clone())?;
        }
        Ok(())
    }

    /// Inspect and commit in one step.
    pub fn detect_local(&self, name: &str, path: &Path) -> Result<ChangeRecord, SyncError> {
        let record = self.inspect(name, path)?;
        self.commit(name, &record)?;
        Ok(record)
    }
}
