//! HTTP utilities for GCP REST API calls

use crate::client::{FetchError, ResourceKind};
use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Maximum length of a provider error message carried into a report
const MAX_REASON_LENGTH: usize = 80;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = floor_char_boundary(body, MAX_LOG_BODY_LENGTH);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Failure of a single API call, before it is tied to a resource
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("API request failed: {status} {message}")]
    Status { status: StatusCode, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Body(String),
}

impl ApiError {
    /// Map onto the engine's error kinds
    pub fn into_fetch_error(self, kind: ResourceKind, id: &str) -> FetchError {
        match self {
            Self::NotFound => FetchError::NotFound {
                kind,
                id: id.to_string(),
            },
            Self::Status { status, message } if is_retryable_status(status) => {
                FetchError::Transient(format!("{status}: {message}"))
            }
            Self::Status { status, message } => FetchError::Rejected {
                status: status.as_u16(),
                reason: friendly_reason(status, &message),
            },
            Self::Timeout => FetchError::Transient("request timed out".to_string()),
            Self::Transport(reason) => FetchError::Transient(reason),
            Self::Body(reason) => FetchError::Malformed(reason),
        }
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// User-facing reason for a non-retryable refusal.
/// Security: generic wording for auth failures, never the raw body.
fn friendly_reason(status: StatusCode, message: &str) -> String {
    match status.as_u16() {
        401 => "Authentication failed. Run 'gcloud auth application-default login'.".to_string(),
        403 => "Permission denied. Check your GCP IAM permissions.".to_string(),
        _ if message.is_empty() => "Invalid request. Check your parameters.".to_string(),
        _ => message.to_string(),
    }
}

/// Pull `error.message` out of a GCP error body, sanitized and truncated
fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_default();

    let sanitized: String = message
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(MAX_REASON_LENGTH)
        .collect();

    if sanitized.len() < message.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("infraprobe/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, ApiError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("GET {} -> 404", url);
            return Err(ApiError::NotFound);
        }

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError::Status {
                status,
                message: error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Unparseable response: {}", sanitize_for_log(&body));
            ApiError::Body(e.to_string())
        })
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(err.to_string())
    }
}
