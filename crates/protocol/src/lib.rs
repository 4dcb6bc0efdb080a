//! Wire types for the call records backend.
//!
//! The agent talks to two endpoints: `POST /login` (JSON) and
//! `POST /call_records` (multipart). Paths, multipart field names and the
//! JSON bodies live here so the uploader and its tests agree on them.

pub mod constants;
pub mod messages;

// Re-export primary types for convenience.
pub use constants::{ALLOWED_EXTENSIONS, AUDIO_CONTENT_TYPE, CALL_RECORDS_PATH, LOGIN_PATH};
pub use messages::{ErrorBody, LoginRequest, LoginResponse};

/// Joins a server base URL and an endpoint path without doubling slashes.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
