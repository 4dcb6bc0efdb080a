//! Uploader error types.

/// Failure of a single upload attempt.
///
/// Every variant is retried the same way; a 4xx rejection gets the same
/// treatment as a 5xx.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no bearer token available, log in first")]
    MissingCredential,

    #[error("bearer token is not a valid header value")]
    InvalidCredential,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server rejected upload: {status} {message}")]
    ServerRejection { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of `POST /login`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("login rejected: {status} {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed login response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Failure reading or writing the session file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
