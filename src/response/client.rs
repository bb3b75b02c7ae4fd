//! Core `ResponseService` trait and the HTTP implementation.
//!
//! [`HttpResponseService`] talks to the note-generation backend:
//! `POST {base_url}/api/response` for replies and `GET {base_url}/api/health`
//! for liveness.  All connection details come from [`ResponseConfig`].

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ResponseConfig;
use crate::midi::{NoteError, NoteList};
use crate::response::wire::{ResponseBody, ResponseRequest};

// ---------------------------------------------------------------------------
// ResponseError
// ---------------------------------------------------------------------------

/// Errors that can occur while asking for a reply.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("response request timed out")]
    Timeout,

    /// The service answered with a non-2xx status.
    #[error("response service returned status {0}")]
    Status(u16),

    /// The body could not be parsed as the expected JSON.
    #[error("failed to parse response body: {0}")]
    Parse(String),

    /// The service replied with no notes.
    #[error("response service returned no notes")]
    EmptyResponse,

    /// A returned note failed range validation.
    #[error("response contained an invalid note: {0}")]
    InvalidNote(#[from] NoteError),
}

impl From<reqwest::Error> for ResponseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResponseError::Timeout
        } else {
            ResponseError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ResponseService trait
// ---------------------------------------------------------------------------

/// Async source of reply phrases.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn ResponseService>`).
#[async_trait]
pub trait ResponseService: Send + Sync {
    /// Answer `notes` played at `bpm` with a non-empty note list.
    async fn respond(&self, bpm: u32, notes: &NoteList) -> Result<NoteList, ResponseError>;

    /// `Ok(())` when the service is reachable and healthy.
    async fn health(&self) -> Result<(), ResponseError>;
}

// ---------------------------------------------------------------------------
// HttpResponseService
// ---------------------------------------------------------------------------

pub struct HttpResponseService {
    client: reqwest::Client,
    config: ResponseConfig,
}

impl HttpResponseService {
    /// Build a service from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &ResponseConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ResponseService for HttpResponseService {
    async fn respond(&self, bpm: u32, notes: &NoteList) -> Result<NoteList, ResponseError> {
        let body = ResponseRequest::new(&self.config.project_id, bpm, notes);

        let response = self
            .client
            .post(self.url("/api/response"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResponseError::Status(status.as_u16()));
        }

        let parsed: ResponseBody = response
            .json()
            .await
            .map_err(|e| ResponseError::Parse(e.to_string()))?;

        let reply = parsed.into_notes(self.config.max_reply_secs)?;
        log::debug!("response: {} note(s) for {} sent", reply.len(), notes.len());
        Ok(reply)
    }

    async fn health(&self) -> Result<(), ResponseError> {
        let response = self.client.get(self.url("/api/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResponseError::Status(status.as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ResponseError::Parse(e.to_string()))?;
        match json["status"].as_str() {
            Some("ok") => Ok(()),
            other => Err(ResponseError::Parse(format!("unexpected health status {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
