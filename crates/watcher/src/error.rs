//! Watcher error types.

use std::path::PathBuf;

/// Errors produced while setting up a folder watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watched folder not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}
