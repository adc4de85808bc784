//! Session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed session constants
pub struct AuthConfig;

impl AuthConfig {
    /// Storage key for the access token
    pub const ACCESS_TOKEN_KEY: &'static str = "access";

    /// Storage key for the refresh token
    pub const REFRESH_TOKEN_KEY: &'static str = "refresh";

    /// Remaining lifetime below which an access token is refreshed before use
    pub const DEFAULT_REFRESH_MARGIN_MS: u64 = 5_000;

    /// Message returned when the identity endpoint gives no `detail`
    pub const LOGIN_FAILED_MESSAGE: &'static str = "Login failed. Please try again.";

    /// Message recorded when storage teardown fails during logout
    pub const LOGOUT_FAILED_MESSAGE: &'static str = "Failed to log out.";
}

/// Tunable session behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Safety margin before token expiry, in milliseconds
    pub refresh_margin_ms: u64,
}

impl SessionConfig {
    /// Refresh margin as a duration
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_millis(self.refresh_margin_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_margin_ms: AuthConfig::DEFAULT_REFRESH_MARGIN_MS,
        }
    }
}
