//! Client error types

use pesa_session::{ResponseFailure, SessionError};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Input rejected before sending
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The session could not authorize the request
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ClientError {
    /// Create error from HTTP status code and response body
    ///
    /// A DRF style `detail` (or `error`) field is preferred over the raw body.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        let message = extract_detail(&body).unwrap_or(body);
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether the session is gone and the user has to log in again
    pub fn requires_login(&self) -> bool {
        match self {
            Self::AuthenticationFailed(_) => true,
            Self::Session(e) => e.is_session_fatal(),
            _ => false,
        }
    }

    /// Per-field validation messages of a 400 response, first message per field
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let Self::BadRequest(body) = self else {
            return BTreeMap::new();
        };
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
            return BTreeMap::new();
        };
        fields
            .into_iter()
            .filter_map(|(field, messages)| {
                let message = match messages {
                    Value::Array(items) => items.into_iter().next()?,
                    other => other,
                };
                match message {
                    Value::String(text) => Some((field, text)),
                    _ => None,
                }
            })
            .collect()
    }
}

impl ResponseFailure for ClientError {
    fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(e) => e.status(),
            Self::ServerError { status, .. } => StatusCode::from_u16(*status).ok(),
            Self::AuthenticationFailed(_) => Some(StatusCode::UNAUTHORIZED),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::BadRequest(_) => Some(StatusCode::BAD_REQUEST),
            Self::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            _ => None,
        }
    }
}

/// Human readable message from an error body
pub fn extract_detail(body: &str) -> Option<String> {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    ["detail", "error"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
