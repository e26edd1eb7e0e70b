//! Error types for fda483-ai
//!
//! Per-row failures (`ServiceError`, `ParseError`) are captured into the
//! row's outcome and never abort a batch. `InputError` is raised before a
//! batch starts and is fatal for the run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Category of a failed classification call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    /// Too many requests in a short window (HTTP 429 without quota wording)
    RateLimited,
    /// Quota exhausted (HTTP 429 / RESOURCE_EXHAUSTED)
    QuotaExceeded,
    /// Call exceeded its time budget
    Timeout,
    /// Connection, DNS or TLS failure before a status was received
    Transport,
    /// Invalid or missing API key
    Authentication,
    /// 5xx from the service
    Server,
    /// Anything else, including malformed service envelopes
    Unknown,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceErrorKind::RateLimited => "rate_limited",
            ServiceErrorKind::QuotaExceeded => "quota_exceeded",
            ServiceErrorKind::Timeout => "timeout",
            ServiceErrorKind::Transport => "transport",
            ServiceErrorKind::Authentication => "authentication",
            ServiceErrorKind::Server => "server",
            ServiceErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A classification call that failed at the service or transport level
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    /// HTTP status, when the service answered at all
    pub status: Option<u16>,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Build from an HTTP status and error text using [`classify_service_error`]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_service_error(Some(status), &message),
            status: Some(status),
            message,
        }
    }

    /// Build from a status-less transport error message
    pub fn from_transport(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_service_error(None, &message),
            status: None,
            message,
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            ServiceErrorKind::Timeout,
            format!("call exceeded {} ms", limit.as_millis()),
        )
    }

    /// Rate-limit or quota rejection
    pub fn is_quota(&self) -> bool {
        matches!(
            self.kind,
            ServiceErrorKind::QuotaExceeded | ServiceErrorKind::RateLimited
        )
    }
}

/// Named rule mapping a service error signal to a [`ServiceErrorKind`]
///
/// With a status: 401/403 are authentication failures, 429 is quota when the
/// text mentions quota (rate limit otherwise), 408/504 are timeouts and other
/// 5xx are server errors. Without a status the message is inspected: an
/// embedded `429` or `RESOURCE_EXHAUSTED` marks a quota rejection.
pub fn classify_service_error(status: Option<u16>, message: &str) -> ServiceErrorKind {
    let lower = message.to_ascii_lowercase();
    let mentions_quota = lower.contains("quota") || lower.contains("resource_exhausted");

    match status {
        Some(401) | Some(403) => ServiceErrorKind::Authentication,
        Some(429) => {
            if mentions_quota {
                ServiceErrorKind::QuotaExceeded
            } else {
                ServiceErrorKind::RateLimited
            }
        }
        Some(408) | Some(504) => ServiceErrorKind::Timeout,
        Some(500..=599) => ServiceErrorKind::Server,
        Some(_) => {
            if mentions_quota {
                ServiceErrorKind::QuotaExceeded
            } else if lower.contains("api key") {
                ServiceErrorKind::Authentication
            } else {
                ServiceErrorKind::Unknown
            }
        }
        None => {
            if mentions_quota || lower.contains("429") {
                ServiceErrorKind::QuotaExceeded
            } else if lower.contains("rate limit") {
                ServiceErrorKind::RateLimited
            } else if lower.contains("timed out") || lower.contains("timeout") {
                ServiceErrorKind::Timeout
            } else {
                ServiceErrorKind::Transport
            }
        }
    }
}

/// The service replied but its text could not be read as the schema
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No JSON payload found in response")]
    NoPayload,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Envelope '{0}' is not a JSON object")]
    EnvelopeNotAnObject(String),

    #[error("Field '{field}' has wrong type, expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
    },
}

/// Input batch could not be accepted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Duplicate identifier in batch: {0}")]
    DuplicateIdentifier(String),

    #[error("Line {line}: missing identifier column '{column}'")]
    MissingIdentifier { line: usize, column: String },

    #[error("Line {line}: {message}")]
    MalformedRow { line: usize, message: String },
}

impl From<InputError> for fda483_common::Error {
    fn from(err: InputError) -> Self {
        fda483_common::Error::InvalidInput(err.to_string())
    }
}
