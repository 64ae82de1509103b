//! Source synchronization for niveflow.
//!
//! Pulls every configured documentation source (git repository or local
//! directory) into a per-source staging directory and reports whether it
//! changed since the last successful sync.

pub mod detector;
pub mod error;
pub mod fingerprint;
pub mod fsutil;
pub mod source;
pub mod store;
pub mod synchronizer;
pub mod vcs;

pub use detector::{ChangeDetector, ChangeEvidence, ChangeRecord};
pub use error::SyncError;
pub use fingerprint::{fingerprint_dir, Fingerprint};
pub use source::{SourceDescriptor, SourceError, SourceKind};
pub use store::{FileBackend, FingerprintBackend, FingerprintCache, MemoryBackend};
pub use synchronizer::{SyncOutcome, Synchronizer};
pub use vcs::{GitCli, VcsClient};
