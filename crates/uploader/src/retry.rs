//! Bounded retry around single upload attempts.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::client::RecordingUploader;
use crate::error::UploadError;

/// Default number of attempts per recording.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lifecycle of one recording's upload.
///
/// `Pending → Attempting → {Succeeded | Attempting (retry) | Exhausted}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Pending,
    Attempting { attempt: u32 },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted { .. })
    }

    /// Number of attempts made so far.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Attempting { attempt } => *attempt,
            Self::Succeeded { attempts } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Delay between attempts. Attempts run back-to-back unless one is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per further failure.
    pub factor: f64,
}

impl Backoff {
    /// Exponential backoff starting at `initial_delay`, doubling, capped at 30s.
    pub fn exponential(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(30),
            factor: 2.0,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// How many times to try a recording, and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Option<Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: None,
        }
    }
}

impl RetryPolicy {
    /// Back-to-back attempts, no delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: None,
        }
    }

    /// Attempts actually made; zero is treated as one.
    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Uploads `path`, retrying until success or `policy.max_attempts` failures.
///
/// Never returns an error: exhaustion is logged and reported as the terminal
/// [`UploadState::Exhausted`]. The file is left where it is either way.
pub async fn upload_with_retry(
    uploader: &dyn RecordingUploader,
    path: &Path,
    policy: &RetryPolicy,
) -> UploadState {
    let max = policy.attempts();
    let mut last_error: Option<UploadError> = None;

    for attempt in 1..=max {
        let state = UploadState::Attempting { attempt };
        debug!(file = %path.display(), ?state, max_attempts = max, "upload attempt");

        match uploader.upload(path).await {
            Ok(()) => {
                info!(file = %path.display(), attempts = attempt, "recording uploaded");
                return UploadState::Succeeded { attempts: attempt };
            }
            Err(e) => {
                warn!(file = %path.display(), attempt, max_attempts = max, error = %e, "upload attempt failed");
                last_error = Some(e);
            }
        }

        if attempt < max
            && let Some(backoff) = &policy.backoff
        {
            tokio::time::sleep(backoff.delay_after(attempt)).await;
        }
    }

    let attempts = max;
    let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
    error!(
        file = %path.display(),
        attempts,
        error = %last_error,
        "upload failed after all attempts, giving up"
    );
    UploadState::Exhausted {
        attempts,
        last_error,
    }
}
