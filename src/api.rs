//! Backend HTTP client.
//!
//! Defines the [`DocsBackend`] trait (the seam the store and auth containers
//! talk to) and [`HttpBackend`], its reqwest implementation against the
//! `/documents` and `/autodoc` endpoint families.
//!
//! # Endpoints
//!
//! | Method | Path | Method on trait |
//! |--------|------|-----------------|
//! | `GET`  | `/documents/chunk-times` | [`DocsBackend::chunk_times`] |
//! | `GET`  | `/documents/chunk/{t}` | [`DocsBackend::documents_by_chunk`] |
//! | `GET`  | `/documents/latest?limit=N` | [`DocsBackend::latest_documents`] |
//! | `GET`  | `/documents/{id}` | [`DocsBackend::document`] |
//! | `PATCH`| `/documents/{id}/content` | [`DocsBackend::update_document`] |
//! | `GET`  | `/documents/count` | [`DocsBackend::count`] |
//! | `GET`  | `/documents/run/{id}` | [`DocsBackend::documents_by_run`] |
//! | `HEAD` | `/documents/count` | [`DocsBackend::health`] |
//! | `POST` | `/autodoc/register` | [`DocsBackend::register`] |
//! | `POST` | `/autodoc/signin` | [`DocsBackend::signin`] |
//!
//! Response bodies are handed to [`crate::normalize`] before they leave this
//! module.

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{RegisterRequest, SigninRequest};
use crate::config::ApiConfig;
use crate::models::{Document, DocumentPatch};
use crate::normalize::{self, NormalizeError};

/// Fixed client timeout for the liveness probe.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure of a single backend call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response. `message` is the body's `message` field, if any.
    #[error("backend returned {status}")]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    /// 2xx response whose body could not be normalized.
    #[error("unexpected response: {0}")]
    Decode(#[from] NormalizeError),

    #[error("invalid endpoint URL: {0}")]
    Url(String),
}

impl ApiError {
    /// The message to show a user: the backend's own message when it sent
    /// one, otherwise `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            ApiError::Status {
                message: Some(m), ..
            } => m.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The remote operations the viewer depends on.
///
/// Every method returns canonical models; implementations own the wire
/// format and its normalization.
#[async_trait]
pub trait DocsBackend: Send + Sync {
    /// All chunk times, in backend order (oldest first).
    async fn chunk_times(&self) -> Result<Vec<String>, ApiError>;

    async fn documents_by_chunk(&self, chunk_time: &str) -> Result<Vec<Document>, ApiError>;

    async fn latest_documents(&self, limit: usize) -> Result<Vec<Document>, ApiError>;

    async fn document(&self, id: &str) -> Result<Document, ApiError>;

    async fn update_document(&self, id: &str, patch: &DocumentPatch)
        -> Result<Document, ApiError>;

    async fn count(&self) -> Result<u64, ApiError>;

    async fn documents_by_run(&self, run_id: &str) -> Result<Vec<Document>, ApiError>;

    /// Bodiless liveness probe.
    async fn health(&self) -> Result<(), ApiError>;

    /// Create an account; returns the issued API key.
    async fn register(&self, request: &RegisterRequest) -> Result<String, ApiError>;

    /// Exchange credentials for an API key.
    async fn signin(&self, request: &SigninRequest) -> Result<String, ApiError>;
}

/// [`DocsBackend`] over HTTP.
pub struct HttpBackend {
    base: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Build a client for `config.base_url`. When `timeout_secs` is unset the
    /// transport default applies.
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let base = Url::parse(&config.base_url)?;
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            base,
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the body of a 2xx response as text.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<String, ApiError> {
        tracing::debug!(%method, %url, "backend request");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(%method, %url, error = %e, "backend unreachable");
            ApiError::Transport(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let message = normalize::error_message(&text);
        tracing::warn!(%method, %url, %status, message = ?message, "backend error");
        Err(ApiError::Status { status, message })
    }

    async fn get_json(&self, url: Url) -> Result<Value, ApiError> {
        let text = self.send(Method::GET, url, None).await?;
        Ok(parse_lenient(&text))
    }

    async fn post_json<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<Value, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| NormalizeError::Document(e.to_string()))?;
        let text = self.send(Method::POST, url, Some(&value)).await?;
        Ok(parse_lenient(&text))
    }
}

/// Parse a body as JSON, degrading to `Null` for empty or non-JSON text so
/// the normalizers can apply their fallbacks.
fn parse_lenient(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or(Value::Null)
}

#[async_trait]
impl DocsBackend for HttpBackend {
    async fn chunk_times(&self) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&["documents", "chunk-times"])?;
        let value = self.get_json(url).await?;
        Ok(normalize::normalize_chunk_times(&value))
    }

    async fn documents_by_chunk(&self, chunk_time: &str) -> Result<Vec<Document>, ApiError> {
        let url = self.endpoint(&["documents", "chunk", chunk_time])?;
        let value = self.get_json(url).await?;
        Ok(normalize::normalize_documents(&value))
    }

    async fn latest_documents(&self, limit: usize) -> Result<Vec<Document>, ApiError> {
        let mut url = self.endpoint(&["documents", "latest"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        let value = self.get_json(url).await?;
        Ok(normalize::normalize_documents(&value))
    }

    async fn document(&self, id: &str) -> Result<Document, ApiError> {
        let url = self.endpoint(&["documents", id])?;
        let text = self.send(Method::GET, url, None).await?;
        Ok(normalize::normalize_document_body(&text, id)?)
    }

    async fn update_document(
        &self,
        id: &str,
        patch: &DocumentPatch,
    ) -> Result<Document, ApiError> {
        let url = self.endpoint(&["documents", id, "content"])?;
        let body =
            serde_json::to_value(patch).map_err(|e| NormalizeError::Document(e.to_string()))?;
        let text = self.send(Method::PATCH, url, Some(&body)).await?;
        Ok(normalize::normalize_document_body(&text, id)?)
    }

    async fn count(&self) -> Result<u64, ApiError> {
        let url = self.endpoint(&["documents", "count"])?;
        let value = self.get_json(url).await?;
        Ok(normalize::normalize_count(&value)?)
    }

    async fn documents_by_run(&self, run_id: &str) -> Result<Vec<Document>, ApiError> {
        let url = self.endpoint(&["documents", "run", run_id])?;
        let value = self.get_json(url).await?;
        Ok(normalize::normalize_documents(&value))
    }

    async fn health(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["documents", "count"])?;
        let response = self
            .client
            .head(url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                status,
                message: None,
            })
        }
    }

    async fn register(&self, request: &RegisterRequest) -> Result<String, ApiError> {
        let url = self.endpoint(&["autodoc", "register"])?;
        let value = self.post_json(url, request).await?;
        normalize::api_key(&value)
            .ok_or_else(|| NormalizeError::Document("missing apiKey".to_string()).into())
    }

    async fn signin(&self, request: &SigninRequest) -> Result<String, ApiError> {
        let url = self.endpoint(&["autodoc", "signin"])?;
        let value = self.post_json(url, request).await?;
        normalize::api_key(&value)
            .ok_or_else(|| NormalizeError::Document("missing apiKey".to_string()).into())
    }
}
