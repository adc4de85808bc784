//! Session error types

use thiserror::Error;

/// Standard result type for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by the session manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The identity endpoint refused the credentials
    #[error("Login failed: {0}")]
    CredentialsRejected(String),

    /// An access token could not be decoded
    #[error("Invalid access token: {0}")]
    TokenInvalid(String),

    /// The refresh endpoint refused the refresh token or could not be reached
    #[error("Session expired: {0}")]
    RefreshRejected(String),

    /// No token pair is held
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Durable token storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Whether this error means the session has been torn down
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::TokenInvalid(_) | Self::RefreshRejected(_) | Self::NotAuthenticated
        )
    }
}

/// Token storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backing store cannot be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the backing store failed
    #[error("Storage I/O failed: {0}")]
    Io(String),

    /// The backing store holds data that cannot be parsed
    #[error("Storage contents are corrupt: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Errors returned by the identity and refresh endpoints
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthApiError {
    /// Server answered with a non-success status
    #[error("Rejected with status {status}")]
    Rejected {
        status: u16,
        /// Human readable `detail` from the error body, when present
        detail: Option<String>,
    },

    /// The request never produced a response
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A success response did not carry the expected fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl AuthApiError {
    /// Server-supplied message, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of a rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_only_on_rejection() {
        let rejected = AuthApiError::Rejected {
            status: 401,
            detail: Some("No active account found with the given credentials".into()),
        };
        assert_eq!(
            rejected.detail(),
            Some("No active account found with the given credentials")
        );
        assert_eq!(rejected.status(), Some(401));

        let transport = AuthApiError::Transport("connection refused".into());
        assert_eq!(transport.detail(), None);
        assert_eq!(transport.status(), None);
    }

    #[test]
    fn test_session_fatal_classification() {
        assert!(SessionError::RefreshRejected("gone".into()).is_session_fatal());
        assert!(SessionError::TokenInvalid("bad".into()).is_session_fatal());
        assert!(!SessionError::CredentialsRejected("nope".into()).is_session_fatal());
        assert!(!SessionError::Storage(StorageError::Io("disk".into())).is_session_fatal());
    }
}
