//! Call recording uploader.
//!
//! One upload attempt ([`UploadClient`]) posts a recording as
//! `multipart/form-data` to `POST <server>/call_records` with a bearer token
//! read from the [`CredentialSource`]. The retry controller
//! ([`upload_with_retry`]) repeats attempts up to a fixed bound and logs the
//! final failure; nothing is reported back to the caller beyond the terminal
//! [`UploadState`].
//!
//! The bearer token comes from a [`TokenStore`] populated by
//! [`AuthClient::login`].

pub mod auth;
pub mod client;
pub mod credential;
pub mod error;
pub mod retry;
pub mod timestamp;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export primary types for convenience.
pub use auth::AuthClient;
pub use client::{RecordingUploader, UploadClient};
pub use credential::{CredentialSource, TokenStore, app_config_dir, default_session_path};
pub use error::{AuthError, StoreError, UploadError};
pub use retry::{Backoff, RetryPolicy, UploadState, upload_with_retry};
pub use timestamp::call_timestamp;
