//! Remote collaborators for the worklog sync.
//!
//! Provides:
//! - [`TogglClient`]: fetches time records from Toggl Track
//! - [`GitHubClient`]: reads and conditionally writes the worklog file
//! - [`SendGridNotifier`]: emails failure notifications
//!
//! The sync loop depends only on the [`RecordSource`], [`DocumentStore`], and
//! [`Notifier`] traits, so tests can substitute in-memory fakes.

mod github;
mod sendgrid;
mod toggl;

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use wl_core::TimeRecord;

pub use github::GitHubClient;
pub use sendgrid::SendGridNotifier;
pub use toggl::TogglClient;

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sent on every request; GitHub rejects requests without one.
const USER_AGENT: &str = concat!("worklog-sync/", env!("CARGO_PKG_VERSION"));

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required credential was missing or malformed.
    #[error("invalid {service} credentials: {reason}")]
    InvalidCredentials {
        service: &'static str,
        reason: &'static str,
    },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("{service} API error (status {status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },
    /// The document changed since it was read.
    #[error("worklog was modified concurrently (version {version} is stale)")]
    Conflict { version: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// The worklog file as last read, with the token needed to overwrite it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// Opaque version token (the blob SHA for GitHub).
    pub version: String,
}

/// Source of raw time records.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
    /// Records that started inside `[start, end)`.
    async fn fetch_records(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeRecord>, ApiError>;

    /// The currently running record, if a timer is active.
    async fn fetch_current_record(&self) -> Result<Option<TimeRecord>, ApiError>;
}

/// Versioned storage for the worklog document.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    async fn read_document(&self) -> Result<Document, ApiError>;

    /// Replaces the document if `version` is still current.
    ///
    /// Returns [`ApiError::Conflict`] when the stored version has moved on.
    /// Implementations must not retry.
    async fn write_document(
        &self,
        content: &str,
        version: &str,
        message: &str,
    ) -> Result<(), ApiError>;
}

/// Best-effort delivery of failure notifications.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    /// Returns true if the notification was accepted for delivery.
    async fn notify(&self, subject: &str, body: &str) -> bool;
}

/// Rejects empty or whitespace-only credentials.
fn validate_credential(
    service: &'static str,
    value: &str,
    what: &'static str,
) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidCredentials {
            service,
            reason: what,
        });
    }
    Ok(())
}

fn build_http() -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(ApiError::ClientBuild)
}

/// Reads a response body, turning non-2xx statuses into [`ApiError::Api`].
async fn read_success_body(
    service: &'static str,
    response: reqwest::Response,
) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Api {
            service,
            status: status.as_u16(),
            message: api_error_message(&body),
        });
    }
    Ok(body)
}

/// Extracts a human-readable message from an error body.
///
/// GitHub uses `{"message": ...}`, SendGrid `{"errors": [{"message": ...}]}`,
/// and Toggl plain text.
fn api_error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorPayload {
        message: Option<String>,
        #[serde(default)]
        errors: Vec<ErrorDetail>,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.message {
            return message;
        }
        if !payload.errors.is_empty() {
            return payload
                .errors
                .into_iter()
                .map(|detail| detail.message)
                .collect::<Vec<_>>()
                .join("; ");
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}
