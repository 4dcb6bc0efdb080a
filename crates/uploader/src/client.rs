//! Single-attempt upload client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use callrelay_protocol::constants::{
    AUDIO_CONTENT_TYPE, CALL_RECORDS_PATH, FIELD_AUDIO_FILE, FIELD_CALL_TIMESTAMP, FIELD_FILENAME,
};
use callrelay_protocol::{ErrorBody, endpoint_url};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::credential::CredentialSource;
use crate::error::UploadError;
use crate::timestamp::call_timestamp;

/// Performs one upload attempt for a recording.
///
/// The retry controller only sees this trait; tests script it directly.
pub trait RecordingUploader: Send + Sync {
    fn upload<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send + 'a>>;
}

/// Uploads recordings to `POST <server>/call_records`.
pub struct UploadClient {
    http: reqwest::Client,
    url: String,
    credentials: Arc<dyn CredentialSource>,
}

impl UploadClient {
    /// Creates a client for the given server base URL.
    ///
    /// `timeout` bounds each request; `None` keeps reqwest's default (no timeout).
    pub fn new(
        server_url: &str,
        credentials: Arc<dyn CredentialSource>,
        timeout: Option<Duration>,
    ) -> Result<Self, UploadError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            url: endpoint_url(server_url, CALL_RECORDS_PATH),
            credentials,
        })
    }

    /// The full upload URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Performs exactly one upload attempt.
    ///
    /// Without a non-empty token this fails before touching the file or the
    /// network.
    pub async fn upload_once(&self, path: &Path) -> Result<(), UploadError> {
        let token = self
            .credentials
            .token()
            .filter(|t| !t.is_empty())
            .ok_or(UploadError::MissingCredential)?;
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| UploadError::InvalidCredential)?;

        // Streamed from disk; only the open handle is held per in-flight upload.
        let file = tokio::fs::File::open(path).await?;
        let metadata = file.metadata().await?;
        let size = metadata.len();
        let timestamp = call_timestamp(metadata.modified()?);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let audio = Part::stream_with_length(file, size)
            .file_name(filename.clone())
            .mime_str(AUDIO_CONTENT_TYPE)?;
        let form = Form::new()
            .text(FIELD_CALL_TIMESTAMP, timestamp.clone())
            .text(FIELD_FILENAME, filename.clone())
            .part(FIELD_AUDIO_FILE, audio);

        debug!(file = %filename, size, call_timestamp = %timestamp, "posting recording");

        let resp = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.bytes().await.unwrap_or_default();
            let message = ErrorBody::parse(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
            return Err(UploadError::ServerRejection {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

impl RecordingUploader for UploadClient {
    fn upload<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send + 'a>> {
        Box::pin(self.upload_once(path))
    }
}
