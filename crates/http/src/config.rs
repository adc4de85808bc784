//! API endpoint configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach the banking API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the API server
    pub base_url: String,

    /// Request timeout in seconds (0 = no timeout)
    pub timeout_secs: u64,

    /// Identity endpoint path
    pub login_path: String,

    /// Refresh endpoint path
    pub refresh_path: String,

    /// User agent sent with every request
    pub user_agent: String,
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 5,
            login_path: "/api/accounts/login/".to_string(),
            refresh_path: "/api/token/refresh/".to_string(),
            user_agent: concat!("pesa-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
