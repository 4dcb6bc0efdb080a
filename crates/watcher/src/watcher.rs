//! Folder watching backends.
//!
//! Both backends are built on `notify`. The native backend reports the two
//! inotify events a finished recording produces (`IN_CREATE` and
//! `IN_CLOSE_WRITE`). The polling backend sees no close events, only mtime
//! changes, so it runs them through `notify-debouncer-mini` and reports a
//! file as finished once it has stopped changing for a settle period.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{AccessKind, AccessMode, CreateKind};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind, new_debouncer_opt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::WatchError;

/// Callback invoked from the watcher thread for every relevant event.
pub type OnEventFn = Box<dyn Fn(FileEvent) + Send + Sync + 'static>;

/// What happened to a file in the watched folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    ClosedWrite,
}

/// A file event inside the watched folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

/// Capability to watch one directory for new files.
pub trait FolderWatcher: Send + Sync {
    /// Starts watching `dir` (non-recursive).
    ///
    /// Fails with [`WatchError::MissingDirectory`] when `dir` does not exist;
    /// there is no waiting for it to appear.
    fn start(&self, dir: &Path, on_event: OnEventFn) -> Result<WatchHandle, WatchError>;
}

/// A running watch. Dropping it stops the watch as well.
pub struct WatchHandle {
    dir: PathBuf,
    _guard: Box<dyn Send>,
}

impl WatchHandle {
    /// Wraps whatever keeps a backend's watch alive; dropping `guard` must
    /// stop event delivery.
    pub fn new(dir: PathBuf, guard: impl Send + 'static) -> Self {
        Self {
            dir,
            _guard: Box::new(guard),
        }
    }

    /// The canonical directory being watched.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stops the watch. No events are delivered afterwards.
    pub fn stop(self) {
        tracing::info!(dir = %self.dir.display(), "stopped watching folder");
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").field("dir", &self.dir).finish()
    }
}

/// Which backend to use, as selected in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    #[default]
    Native,
    Poll,
}

impl WatchBackend {
    /// Builds the watcher for this backend.
    pub fn build(self, poll_interval: Duration) -> Box<dyn FolderWatcher> {
        match self {
            WatchBackend::Native => Box::new(NativeWatcher),
            WatchBackend::Poll => Box::new(PollingWatcher::new(poll_interval)),
        }
    }
}

/// OS notification backend (inotify, FSEvents, ReadDirectoryChangesW).
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeWatcher;

impl FolderWatcher for NativeWatcher {
    fn start(&self, dir: &Path, on_event: OnEventFn) -> Result<WatchHandle, WatchError> {
        let dir = resolve_dir(dir)?;
        let watched = dir.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            dispatch(res, &watched, classify_native, &on_event);
        })?;
        start_watching(dir, Box::new(watcher), "native")
    }
}

/// Portable polling backend.
///
/// Emits a single `ClosedWrite` per file once its mtime has stayed unchanged
/// for the settle period. A recording that is still growing is not reported.
#[derive(Debug, Clone, Copy)]
pub struct PollingWatcher {
    interval: Duration,
    settle: Duration,
}

impl PollingWatcher {
    /// Default interval between directory scans.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Default settle period, in poll intervals.
    const SETTLE_INTERVALS: u32 = 3;

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            settle: interval * Self::SETTLE_INTERVALS,
        }
    }

    /// Sets how long a file must stay unchanged before it counts as finished.
    /// Never shorter than one poll interval.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle.max(self.interval);
        self
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }
}

impl Default for PollingWatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl FolderWatcher for PollingWatcher {
    fn start(&self, dir: &Path, on_event: OnEventFn) -> Result<WatchHandle, WatchError> {
        let dir = resolve_dir(dir)?;
        let watched = dir.clone();
        let config = notify_debouncer_mini::Config::default()
            .with_timeout(self.settle)
            .with_notify_config(notify::Config::default().with_poll_interval(self.interval));
        let mut debouncer =
            new_debouncer_opt::<_, notify::PollWatcher>(config, move |res: DebounceEventResult| {
                dispatch_settled(res, &watched, &on_event);
            })?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(
            dir = %dir.display(),
            backend = "poll",
            interval_ms = self.interval.as_millis() as u64,
            settle_ms = self.settle.as_millis() as u64,
            "watching folder"
        );
        Ok(WatchHandle::new(dir, debouncer))
    }
}

/// Starts `watcher` and forwards its events into an unbounded channel.
///
/// The receiver is the lazy event sequence: it yields until the returned
/// handle is stopped or dropped, and cannot be restarted.
pub fn watch_stream(
    watcher: &dyn FolderWatcher,
    dir: &Path,
) -> Result<(WatchHandle, mpsc::UnboundedReceiver<FileEvent>), WatchError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = watcher.start(
        dir,
        Box::new(move |event| {
            // Receiver gone means the pipeline is shutting down.
            let _ = tx.send(event);
        }),
    )?;
    Ok((handle, rx))
}

fn resolve_dir(dir: &Path) -> Result<PathBuf, WatchError> {
    if !dir.is_dir() {
        return Err(WatchError::MissingDirectory(dir.to_path_buf()));
    }
    Ok(dir.canonicalize()?)
}

fn start_watching(
    dir: PathBuf,
    mut watcher: Box<dyn Watcher + Send>,
    backend: &'static str,
) -> Result<WatchHandle, WatchError> {
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::info!(dir = %dir.display(), backend, "watching folder");
    Ok(WatchHandle::new(dir, watcher))
}

/// Filters one raw `notify` result down to [`FileEvent`]s for direct children of `dir`.
fn dispatch(
    res: notify::Result<Event>,
    dir: &Path,
    classify: fn(&EventKind) -> Option<FileEventKind>,
    on_event: &OnEventFn,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "folder watch error");
            return;
        }
    };

    let Some(kind) = classify(&event.kind) else {
        return;
    };

    for path in event.paths {
        if path.parent() != Some(dir) || path.is_dir() {
            continue;
        }
        tracing::trace!(file = %path.display(), ?kind, "file event");
        on_event(FileEvent { path, kind });
    }
}

/// Forwards files that have stopped changing as `ClosedWrite`.
///
/// Removed files also settle; they are dropped here since only existing
/// regular files can be uploaded.
fn dispatch_settled(res: DebounceEventResult, dir: &Path, on_event: &OnEventFn) {
    let events = match res {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "folder watch error");
            return;
        }
    };

    for event in events {
        let Some(kind) = classify_settled(&event.kind) else {
            continue;
        };
        if event.path.parent() != Some(dir) || !event.path.is_file() {
            continue;
        }
        tracing::trace!(file = %event.path.display(), ?kind, "file settled");
        on_event(FileEvent {
            path: event.path,
            kind,
        });
    }
}

fn classify_native(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => Some(FileEventKind::Created),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            Some(FileEventKind::ClosedWrite)
        }
        _ => None,
    }
}

fn classify_settled(kind: &DebouncedEventKind) -> Option<FileEventKind> {
    match kind {
        DebouncedEventKind::Any => Some(FileEventKind::ClosedWrite),
        // Still being written.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, ModifyKind, RemoveKind};

    async fn collect_for(
        rx: &mut mpsc::UnboundedReceiver<FileEvent>,
        wait: Duration,
    ) -> Vec<FileEvent> {
        let mut events = Vec::new();
        let deadline = tokio::time::Instant::now() + wait;
        while let Ok(Some(ev)) = tokio::time::timeout_at(deadline, rx.recv()).await {
            events.push(ev);
        }
        events
    }

    #[test]
    fn classify_native_events() {
        assert_eq!(
            classify_native(&EventKind::Create(CreateKind::File)),
            Some(FileEventKind::Created)
        );
        assert_eq!(
            classify_native(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
            Some(FileEventKind::ClosedWrite)
        );
        assert_eq!(classify_native(&EventKind::Create(CreateKind::Folder)), None);
        assert_eq!(
            classify_native(&EventKind::Modify(ModifyKind::Data(DataChange::Any))),
            None
        );
        assert_eq!(
            classify_native(&EventKind::Access(AccessKind::Close(AccessMode::Read))),
            None
        );
        assert_eq!(classify_native(&EventKind::Remove(RemoveKind::File)), None);
    }

    #[test]
    fn classify_settled_events() {
        assert_eq!(
            classify_settled(&DebouncedEventKind::Any),
            Some(FileEventKind::ClosedWrite)
        );
        assert_eq!(classify_settled(&DebouncedEventKind::AnyContinuous), None);
    }

    #[test]
    fn settle_defaults_to_three_intervals() {
        let w = PollingWatcher::new(Duration::from_millis(100));
        assert_eq!(w.settle(), Duration::from_millis(300));

        let w = w.with_settle(Duration::from_millis(10));
        assert_eq!(w.settle(), Duration::from_millis(100));
    }

    #[test]
    fn dispatch_drops_foreign_paths() {
        use std::sync::{Arc, Mutex};

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().canonicalize().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let on_event: OnEventFn = Box::new(move |ev| seen2.lock().unwrap().push(ev));

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(dir.join("call1.mp3"))
            .add_path(dir.join("sub").join("deep.mp3"))
            .add_path(PathBuf::from("/elsewhere/call.mp3"));
        dispatch(Ok(event), &dir, classify_native, &on_event);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, dir.join("call1.mp3"));
        assert_eq!(seen[0].kind, FileEventKind::Created);
    }

    #[test]
    fn native_missing_dir_fails_fast() {
        let err = NativeWatcher
            .start(Path::new("/nonexistent/callrelay/Call"), Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, WatchError::MissingDirectory(_)));
    }

    #[test]
    fn polling_missing_dir_fails_fast() {
        let err = PollingWatcher::default()
            .start(Path::new("/nonexistent/callrelay/Call"), Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, WatchError::MissingDirectory(_)));
    }

    #[test]
    fn backend_from_config_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            watcher: WatchBackend,
        }
        let w: Wrapper = serde_json::from_str(r#"{"watcher":"poll"}"#).unwrap();
        assert_eq!(w.watcher, WatchBackend::Poll);
        assert_eq!(WatchBackend::default(), WatchBackend::Native);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn native_reports_create_and_close_write() {
        let tmp = tempfile::tempdir().unwrap();
        let (handle, mut rx) = watch_stream(&NativeWatcher, tmp.path()).unwrap();

        let path = handle.dir().join("call1.mp3");
        std::fs::write(&path, b"audio").unwrap();

        let events = collect_for(&mut rx, Duration::from_secs(1)).await;
        assert!(events.iter().all(|e| e.path == path));
        assert!(events.iter().any(|e| e.kind == FileEventKind::Created));
        assert!(events.iter().any(|e| e.kind == FileEventKind::ClosedWrite));

        handle.stop();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn native_ignores_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let (handle, mut rx) = watch_stream(&NativeWatcher, tmp.path()).unwrap();

        let sub = handle.dir().join("archive");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("old.mp3"), b"audio").unwrap();

        let events = collect_for(&mut rx, Duration::from_millis(500)).await;
        assert!(events.is_empty(), "unexpected events: {events:?}");
        handle.stop();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn stopped_watch_emits_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let (handle, mut rx) = watch_stream(&NativeWatcher, &dir).unwrap();
        handle.stop();
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(dir.join("late.mp3"), b"audio").unwrap();

        // The sender lives in the dropped watcher's event loop, so the stream ends.
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(next, Ok(None)), "got {next:?}");
    }

    #[tokio::test]
    async fn polling_reports_new_file_once() {
        let tmp = tempfile::tempdir().unwrap();
        let watcher = PollingWatcher::new(Duration::from_millis(100));
        let (handle, mut rx) = watch_stream(&watcher, tmp.path()).unwrap();

        // Give the poller its baseline scan before the file appears.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let path = handle.dir().join("call9.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let events = collect_for(&mut rx, Duration::from_secs(2)).await;
        assert_eq!(
            events,
            vec![FileEvent {
                path,
                kind: FileEventKind::ClosedWrite
            }]
        );
        handle.stop();
    }

    #[tokio::test]
    async fn polling_waits_for_slow_writes_to_settle() {
        use std::io::Write;

        let tmp = tempfile::tempdir().unwrap();
        let watcher =
            PollingWatcher::new(Duration::from_millis(100)).with_settle(Duration::from_millis(600));
        let (handle, mut rx) = watch_stream(&watcher, tmp.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        // A recording that keeps growing for well over the settle period.
        let path = handle.dir().join("call1.mp3");
        let mut file = std::fs::File::create(&path).unwrap();
        for _ in 0..8 {
            file.write_all(&[0u8; 4096]).unwrap();
            file.flush().unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        drop(file);

        let events = collect_for(&mut rx, Duration::from_secs(2)).await;
        let closed: Vec<_> = events
            .iter()
            .filter(|e| e.kind == FileEventKind::ClosedWrite)
            .collect();
        assert_eq!(closed.len(), 1, "events: {events:?}");
        assert_eq!(closed[0].path, path);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 * 4096);
        handle.stop();
    }

    #[tokio::test]
    async fn polling_ignores_removed_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("old.amr");
        std::fs::write(&path, b"#!AMR").unwrap();

        let watcher = PollingWatcher::new(Duration::from_millis(100));
        let (handle, mut rx) = watch_stream(&watcher, tmp.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        std::fs::remove_file(&path).unwrap();

        let events = collect_for(&mut rx, Duration::from_secs(1)).await;
        assert!(events.is_empty(), "unexpected events: {events:?}");
        handle.stop();
    }
}
