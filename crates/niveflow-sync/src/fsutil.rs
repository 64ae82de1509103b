//! Directory copy helpers shared by staging and building.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

/// Hidden entries and `node_modules` never leave a source directory.
pub fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.') || name == "node_modules"
}

/// Version-control metadata is dropped when staging for a build.
pub fn is_vcs_name(name: &str) -> bool {
    name.starts_with(".git")
}

/// Recursively copy `src` into `dest`, skipping any entry (file or
/// directory) whose name matches `skip`. Returns the number of files copied.
pub fn copy_tree(src: &Path, dest: &Path, skip: impl Fn(&str) -> bool) -> Result<usize, SyncError> {
    fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;

    let mut copied = 0;
    let walker = WalkDir::new(src)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !skip(&entry.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| io_err(entry.path(), e))?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Make `dir` exist and contain nothing.
pub fn empty_dir(dir: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| io_err(&path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
    }

    Ok(())
}

/// Sibling path used to assemble a replacement for `dest`.
pub fn incoming_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "staging".to_string());
    dest.with_file_name(format!(".{name}.incoming"))
}

/// Replace `dest` with a directory filled by `fill`.
///
/// `fill` writes into a sibling scratch directory; `dest` is only swapped
/// out once it succeeds, so a failure leaves the previous contents intact.
pub fn replace_dir<T>(
    dest: &Path,
    fill: impl FnOnce(&Path) -> Result<T, SyncError>,
) -> Result<T, SyncError> {
    let incoming = incoming_path(dest);
    if incoming.exists() {
        fs::remove_dir_all(&incoming).map_err(|e| io_err(&incoming, e))?;
    }
    fs::create_dir_all(&incoming).map_err(|e| io_err(&incoming, e))?;

    let value = match fill(&incoming) {
        Ok(value) => value,
        Err(err) => {
            let _ = fs::remove_dir_all(&incoming);
            return Err(err);
        }
    };

    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|e| io_err(dest, e))?;
    }
    fs::rename(&incoming, dest).map_err(|e| io_err(dest, e))?;

    Ok(value)
}
