//! Content fingerprints for local documentation directories.

use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{io_err, SyncError};
use crate::fsutil::is_ignored_name;

/// File name suffixes that participate in the fingerprint.
pub const TRACKED_SUFFIXES: &[&str] = &[".md", ".json"];

/// Deterministic digest of a directory's tracked files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell runs apart in logs.
        let short: String = self.0.chars().take(12).collect();
        f.write_str(&short)
    }
}

/// Whether a file name is one the fingerprint tracks.
pub fn is_tracked(file_name: &str) -> bool {
    TRACKED_SUFFIXES
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
}

/// Fingerprint a directory tree.
///
/// Hashes `(relative path, mtime, length)` of every tracked file. Entries
/// whose name starts with `.` and `node_modules` directories are skipped.
/// Entries are visited in file-name order so an unchanged tree always yields
/// the same fingerprint.
pub fn fingerprint_dir(root: &Path) -> Result<Fingerprint, SyncError> {
    let mut hasher = Sha256::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_ignored_name(&entry.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !is_tracked(&name) {
            continue;
        }

        let metadata = entry.metadata()?;
        let modified_ms = metadata
            .modified()
            .map_err(|e| io_err(entry.path(), e))?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());

        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0]);
        hasher.update(modified_ms.to_le_bytes());
        hasher.update(metadata.len().to_le_bytes());
    }

    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    use filetime::{set_file_mtime, FileTime};
    use tempfile::tempdir;

    fn docs_tree() -> tempfile::TempDir {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("guide")).unwrap();
        fs::write(root.join("README.md"), "# Docs").unwrap();
        fs::write(root.join("meta.json"), r#"{"title":"Docs"}"#).unwrap();
        fs::write(root.join("guide/install.md"), "# Install").unwrap();
        temp
    }

    #[test]
    fn display_shortens_by_characters() {
        assert_eq!(Fingerprint::new("0123456789abcdef").to_string(), "0123456789ab");
        assert_eq!(Fingerprint::new("ééééééééééééé").to_string(), "éééééééééééé");
        assert_eq!(Fingerprint::new("abc").to_string(), "abc");
    }

    #[test]
    fn stable_for_unchanged_tree() {
        let temp = docs_tree();

        let first = fingerprint_dir(temp.path()).unwrap();
        let second = fingerprint_dir(temp.path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn content_length_change_is_detected() {
        let temp = docs_tree();
        let before = fingerprint_dir(temp.path()).unwrap();

        fs::write(temp.path().join("guide/install.md"), "# Install\n\nMore steps.").unwrap();

        assert_ne!(before, fingerprint_dir(temp.path()).unwrap());
    }

    #[test]
    fn mtime_change_is_detected() {
        let temp = docs_tree();
        let file = temp.path().join("meta.json");
        let before = fingerprint_dir(temp.path()).unwrap();

        let later = SystemTime::now() + Duration::from_secs(120);
        set_file_mtime(&file, FileTime::from_system_time(later)).unwrap();

        assert_ne!(before, fingerprint_dir(temp.path()).unwrap());
    }

    #[test]
    fn untracked_files_are_ignored() {
        let temp = docs_tree();
        let before = fingerprint_dir(temp.path()).unwrap();

        fs::write(temp.path().join("logo.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(temp.path().join("guide/diagram.svg"), "<svg/>").unwrap();

        assert_eq!(before, fingerprint_dir(temp.path()).unwrap());
    }

    #[test]
    fn hidden_entries_and_node_modules_are_ignored() {
        let temp = docs_tree();
        let before = fingerprint_dir(temp.path()).unwrap();

        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git/HEAD.md"), "ref").unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();
        fs::write(temp.path().join("node_modules/pkg/package.json"), "{}").unwrap();
        fs::write(temp.path().join(".draft.md"), "# Draft").unwrap();

        assert_eq!(before, fingerprint_dir(temp.path()).unwrap());
    }

    #[test]
    fn added_tracked_file_is_detected() {
        let temp = docs_tree();
        let before = fingerprint_dir(temp.path()).unwrap();

        fs::write(temp.path().join("guide/faq.md"), "# FAQ").unwrap();

        assert_ne!(before, fingerprint_dir(temp.path()).unwrap());
    }
}
