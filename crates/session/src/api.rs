//! Identity and refresh endpoint seam

use crate::error::AuthApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Username and password sent to the identity endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Access and refresh token pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Remote endpoints that issue and refresh tokens
///
/// Implementations must not route through the session's own request
/// decoration, or a refresh would recurse into itself.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token pair
    async fn obtain_token_pair(&self, credentials: &Credentials)
    -> Result<TokenPair, AuthApiError>;

    /// Exchange a refresh token for a new access token
    async fn refresh_access_token(&self, refresh: &str) -> Result<String, AuthApiError>;
}
