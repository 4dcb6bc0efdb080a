//! Recording service: watch loop plus per-file upload tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use callrelay_uploader::{RecordingUploader, RetryPolicy, UploadState, upload_with_retry};
use callrelay_watcher::{
    FolderWatcher, WatchError, WatchedFile, scan_existing, watch_stream,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Callback invoked with the terminal state of every upload task.
pub type OnOutcomeFn = Arc<dyn Fn(&Path, &UploadState) + Send + Sync + 'static>;

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Folder the recorder writes into.
    pub watch_dir: PathBuf,
    pub retry: RetryPolicy,
    /// Upload recordings already in the folder when the service starts.
    pub scan_existing_on_start: bool,
}

/// Running pipeline. Stops on [`RecordingService::shutdown`] or drop of the
/// runtime; in-flight uploads are abandoned, not awaited.
pub struct RecordingService {
    watch_dir: PathBuf,
    cancel: CancellationToken,
    event_loop: JoinHandle<()>,
    dispatched: Arc<AtomicUsize>,
}

/// Turns accepted paths into upload tasks.
#[derive(Clone)]
struct Dispatcher {
    uploader: Arc<dyn RecordingUploader>,
    policy: Arc<RetryPolicy>,
    on_outcome: Option<OnOutcomeFn>,
    dispatched: Arc<AtomicUsize>,
}

impl Dispatcher {
    /// Spawns an upload task for `path` if it is an allow-listed recording.
    fn submit(&self, path: PathBuf, trigger: &'static str) -> bool {
        let Some(file) = WatchedFile::from_path(&path) else {
            tracing::debug!(file = %path.display(), trigger, "ignoring non-recording file");
            return false;
        };

        tracing::info!(
            file = %file.name(),
            extension = %file.extension,
            trigger,
            state = ?UploadState::Pending,
            "recording detected"
        );

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let uploader = Arc::clone(&self.uploader);
        let policy = Arc::clone(&self.policy);
        let on_outcome = self.on_outcome.clone();

        tokio::spawn(async move {
            let state = upload_with_retry(uploader.as_ref(), &path, &policy).await;
            if let Some(cb) = on_outcome {
                cb(&path, &state);
            }
        });
        true
    }
}

impl RecordingService {
    /// Starts watching and uploading. Must be called inside a tokio runtime.
    ///
    /// A missing folder is the one error surfaced here, and nothing is
    /// started when it happens.
    pub fn start(
        config: PipelineConfig,
        watcher: &dyn FolderWatcher,
        uploader: Arc<dyn RecordingUploader>,
        on_outcome: Option<OnOutcomeFn>,
    ) -> Result<Self, WatchError> {
        let (handle, mut events) = watch_stream(watcher, &config.watch_dir)?;
        let watch_dir = handle.dir().to_path_buf();

        let dispatched = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher {
            uploader,
            policy: Arc::new(config.retry),
            on_outcome,
            dispatched: Arc::clone(&dispatched),
        };

        if config.scan_existing_on_start {
            let existing = scan_existing(&watch_dir)?;
            tracing::info!(count = existing.len(), "uploading recordings found at startup");
            for path in existing {
                dispatcher.submit(path, "scan");
            }
        }

        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let event_loop = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            dispatcher.submit(event.path, "watch");
                        }
                        None => break,
                    },
                }
            }
            handle.stop();
        });

        Ok(Self {
            watch_dir,
            cancel,
            event_loop,
            dispatched,
        })
    }

    /// The canonical folder being watched.
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Number of upload tasks spawned so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Stops the watcher. Upload tasks already spawned keep running until the
    /// runtime goes away.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.event_loop.await {
            tracing::warn!(error = %e, "watch loop ended abnormally");
        }
        tracing::info!(
            dir = %self.watch_dir.display(),
            dispatched = self.dispatched.load(Ordering::Relaxed),
            "recording service stopped"
        );
    }
}
