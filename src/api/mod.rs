//! Client for the chest X-ray analysis service.
//!
//! The service answers every endpoint with JSON. Failures are reported as an
//! `{"error": "..."}` body, usually alongside a 400 or 500 status, so the
//! `error` field is checked before the HTTP status.

mod client;
mod types;

pub use client::ApiClient;
pub use types::{
    AnalysisResult, AnalysisUpload, HistoryEntry, PathAnalysisRequest, QuestionAnswer,
    QuestionRequest, ServiceInfo, StructuredFindings,
};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Errors from talking to the analysis service
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered with an `error` field
    #[error("{0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build request: {0}")]
    Request(String),
}

impl ApiError {
    /// True when the service itself reported the failure
    pub fn is_server_reported(&self) -> bool {
        matches!(self, ApiError::Server(_))
    }
}

/// The three endpoints the page drives.
///
/// Implemented by [`ApiClient`]; the workspace only depends on this trait.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// `POST /upload_and_analyze`
    async fn upload_and_analyze(&self, upload: AnalysisUpload) -> Result<AnalysisResult, ApiError>;

    /// `POST /question`
    async fn ask_question(&self, question: &str, image_path: &str)
        -> Result<QuestionAnswer, ApiError>;

    /// `GET /history?q=...`; the service filters by patient name or exam date
    async fn history(&self, query: &str) -> Result<Vec<HistoryEntry>, ApiError>;
}

#[derive(Deserialize)]
struct ErrorProbe {
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ErrorProbe {
    fn into_message(self) -> Option<String> {
        match self.error? {
            serde_json::Value::Null | serde_json::Value::Bool(false) => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

/// Decode a response body into `T`, surfacing a service `error` field first
pub(crate) fn decode_reply<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    match serde_json::from_str::<ErrorProbe>(body) {
        Ok(probe) => {
            if let Some(message) = probe.into_message() {
                return Err(ApiError::Server(message));
            }
        }
        Err(e) if status.is_success() => return Err(ApiError::Parse(e.to_string())),
        Err(_) => {}
    }

    if !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}
