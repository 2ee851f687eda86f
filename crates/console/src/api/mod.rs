//! REST client for the monitoring backend.
//!
//! # API Reference
//!
//! - Base URL: configurable, `http://localhost:5000/api` by default
//! - Authentication: `Authorization: Bearer <token>` from the login response
//! - Errors: JSON bodies of the form `{"error": "<message>"}`
//!
//! Endpoints that require a session take a `&Session`. Callers holding an
//! optional session go through [`require_session`] first, which fails with
//! [`ApiError::MissingSession`] before any request is sent.

mod endpoints;
mod types;

pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use mindwatch_core::Session;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials rejected or session no longer valid (401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend rejected the submitted data (400).
    #[error("Validation failed: {message}")]
    Validation { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An authenticated endpoint was called without a usable session.
    #[error("No active session")]
    MissingSession,

    /// Endpoint URL could not be built from the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Backend API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base: Url,
}

/// Check that a session is present and carries a token.
///
/// # Errors
///
/// Returns [`ApiError::MissingSession`] when `session` is `None` or its
/// token is blank.
pub fn require_session(session: Option<&Session>) -> Result<&Session, ApiError> {
    match session {
        Some(session) if !session.has_blank_token() => Ok(session),
        _ => Err(ApiError::MissingSession),
    }
}

impl ApiClient {
    /// Create a new client for the backend at `base`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ApiError> {
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mindwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner { client, base }),
        })
    }

    /// Create a client from console configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn from_config(config: &crate::ConsoleConfig) -> Result<Self, ApiError> {
        Self::new(config.api_base.clone(), config.request_timeout)
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    /// Build an endpoint URL by appending percent-encoded path segments.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.inner.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request, attaching the bearer token when a session is given.
    pub(crate) fn request(
        &self,
        method: reqwest::Method,
        url: Url,
        session: Option<&Session>,
    ) -> reqwest::RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match session {
            Some(session) => builder.bearer_auth(session.token().expose_secret()),
            None => builder,
        }
    }

    /// Execute a GET request.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        session: Option<&Session>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        let response = self
            .request(reqwest::Method::GET, url, session)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Execute a POST request with a JSON body.
    pub(crate) async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        segments: &[&str],
        body: &B,
        session: Option<&Session>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        let response = self
            .request(reqwest::Method::POST, url, session)
            .json(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Execute a request whose success body is ignored.
    pub(crate) async fn send_empty(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::parse_error(response).await)
    }

    /// Handle API response and parse JSON.
    pub(crate) async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::Decode(format!("Failed to parse response: {e}")));
        }

        Err(Self::parse_error(response).await)
    }

    /// Map a non-success response to an [`ApiError`].
    async fn parse_error(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return ApiError::RateLimited(retry_after);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = error_message(&body);

        match status {
            400 => ApiError::Validation { status, message },
            401 | 403 => ApiError::Unauthorized(message),
            404 => ApiError::NotFound(message),
            _ => ApiError::Api { status, message },
        }
    }
}

/// Extract `error` from a `{"error": "..."}` body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base.as_str())
            .finish_non_exhaustive()
    }
}
