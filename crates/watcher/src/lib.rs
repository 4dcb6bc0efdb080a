//! Recording folder watcher.
//!
//! Watches a single directory (non-recursive) and reports files that were
//! created or finished being written. Two backends sit behind the
//! [`FolderWatcher`] capability: the OS notification API via `notify`
//! (inotify on Linux) and a portable polling fallback.
//!
//! The [`filter`] module decides which of those files are call recordings.

pub mod error;
pub mod filter;
pub mod watcher;

// Re-export primary types for convenience.
pub use error::WatchError;
pub use filter::{WatchedFile, is_allowed_recording, scan_existing};
pub use watcher::{
    FileEvent, FileEventKind, FolderWatcher, NativeWatcher, OnEventFn, PollingWatcher,
    WatchBackend, WatchHandle, watch_stream,
};
