//! Filesystem operations module.
//!
//! This module provides the filesystem side of packing:
//! - Walking the requested entry names (without following symlinks)
//! - Counting entries concurrently to establish the progress denominator
//! - Removing a partially written archive after cancellation

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::EngineError;

/// Build the walker used for both counting and packing, so the two passes
/// visit exactly the same entries in the same order.
pub(crate) fn walker(root: &Path) -> WalkDir {
    WalkDir::new(root)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
}

/// Convert a walkdir failure into an engine error carrying the system message.
pub(crate) fn walk_error(err: walkdir::Error, fallback: &Path) -> EngineError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop found"));
    EngineError::filesystem("lstat", &path, source)
}

/// Count every file, directory and symlink under `base/name` for each name.
///
/// One walk runs per name on the rayon pool. The sum is only returned once all
/// walks have joined; if any walk fails, the first error observed is returned
/// and the remaining results are discarded.
///
/// # Errors
/// Returns EngineError::Filesystem if any name cannot be walked.
pub fn count_entries<S: AsRef<str> + Sync>(base: &Path, names: &[S]) -> Result<u64, EngineError> {
    let total = names
        .par_iter()
        .map(|name| count_tree(&base.join(name.as_ref())))
        .try_reduce(|| 0, |a, b| Ok(a + b))?;

    debug!(names = names.len(), total, "counted entries");
    Ok(total)
}

fn count_tree(root: &Path) -> Result<u64, EngineError> {
    let mut count = 0;
    for entry in walker(root) {
        entry.map_err(|e| walk_error(e, root))?;
        count += 1;
    }
    Ok(count)
}

/// Name of a walked entry inside the archive: relative to `base`, `/`-separated.
///
/// The base directory itself (packing `.`) is named `.`.
pub(crate) fn archive_name(base: &Path, entry: &DirEntry) -> PathBuf {
    let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
    let name: PathBuf = relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if name.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        name
    }
}

/// Delete a partially written archive.
///
/// # Errors
/// Returns EngineError::Filesystem (op `unlink`) if the file cannot be removed.
pub fn remove_destination(path: &Path) -> Result<(), EngineError> {
    fs::remove_file(path).map_err(|e| EngineError::filesystem("unlink", path, e))
}
