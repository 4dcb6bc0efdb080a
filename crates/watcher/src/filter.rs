//! Call recording allow-list and the initial folder scan.

use std::path::{Path, PathBuf};

use callrelay_protocol::ALLOWED_EXTENSIONS;

use crate::error::WatchError;

/// A recording picked up from the watched folder.
///
/// Only lives between detection and the spawn of its upload task. The
/// last-modified time is read by the upload attempt itself, so a retry after
/// the recorder finished writing sends the final mtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    pub path: PathBuf,
    /// Lower-cased extension.
    pub extension: String,
}

impl WatchedFile {
    /// Builds a `WatchedFile` for an allow-listed path, or `None` otherwise.
    ///
    /// Looks at the name only; safe to call from the async event loop.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = lowercase_extension(path)?;
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return None;
        }
        Some(Self {
            path: path.to_path_buf(),
            extension,
        })
    }

    /// File name for logging.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Returns whether `path` carries an allow-listed audio extension.
///
/// Case-insensitive; looks at the file name only, never touches the disk.
pub fn is_allowed_recording(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Lists the allow-listed regular files already present in `dir`.
///
/// Sorted by path. Holds no record of earlier scans: running it twice on an
/// unchanged folder returns the same files both times.
pub fn scan_existing(dir: &Path) -> Result<Vec<PathBuf>, WatchError> {
    if !dir.is_dir() {
        return Err(WatchError::MissingDirectory(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| is_allowed_recording(path))
        .collect();

    files.sort_unstable();
    Ok(files)
}
