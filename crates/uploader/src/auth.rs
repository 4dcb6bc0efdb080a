//! `POST /login` client.

use callrelay_protocol::{ErrorBody, LOGIN_PATH, LoginRequest, LoginResponse, endpoint_url};
use tracing::info;

use crate::error::AuthError;

/// Exchanges username and password for a bearer token.
pub struct AuthClient {
    http: reqwest::Client,
    url: String,
}

impl AuthClient {
    /// Creates a client for the given server base URL.
    pub fn new(server_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: endpoint_url(server_url, LOGIN_PATH),
        }
    }

    /// Logs in and returns the issued token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self.http.post(&self.url).json(&req).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: ErrorBody::parse(&body).unwrap_or_else(|| "invalid credentials".into()),
            });
        }

        let LoginResponse { token } = serde_json::from_slice(&body)?;
        info!(username, "logged in");
        Ok(token)
    }
}
