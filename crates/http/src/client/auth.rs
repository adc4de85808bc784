//! Identity and refresh endpoints

use super::error::{ClientError, extract_detail};
use super::{build_http_client, normalize_base_url};
use crate::config::ApiConfig;
use async_trait::async_trait;
use pesa_session::{AuthApi, AuthApiError, Credentials, TokenPair};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Talks to the token endpoints directly, bypassing session decoration
#[derive(Clone)]
pub struct AuthApiClient {
    client: Client,
    login_url: String,
    refresh_url: String,
}

impl AuthApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(&config.base_url)?;
        let client = build_http_client(config)?;
        Ok(Self::with_client(client, &base_url, config))
    }

    pub(crate) fn with_client(client: Client, base_url: &str, config: &ApiConfig) -> Self {
        Self {
            client,
            login_url: format!("{base_url}{}", config.login_path),
            refresh_url: format!("{base_url}{}", config.refresh_path),
        }
    }
}

#[async_trait]
impl AuthApi for AuthApiClient {
    async fn obtain_token_pair(
        &self,
        credentials: &Credentials,
    ) -> Result<TokenPair, AuthApiError> {
        debug!(url = %self.login_url, "Requesting token pair");
        let response = self
            .client
            .post(&self.login_url)
            .json(credentials)
            .send()
            .await
            .map_err(|e| AuthApiError::Transport(e.to_string()))?;
        let response = reject_failure(response).await?;
        response
            .json::<TokenPair>()
            .await
            .map_err(|e| AuthApiError::MalformedResponse(e.to_string()))
    }

    async fn refresh_access_token(&self, refresh: &str) -> Result<String, AuthApiError> {
        debug!(url = %self.refresh_url, "Requesting new access token");
        let response = self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh })
            .send()
            .await
            .map_err(|e| AuthApiError::Transport(e.to_string()))?;
        let response = reject_failure(response).await?;
        response
            .json::<RefreshResponse>()
            .await
            .map(|body| body.access)
            .map_err(|e| AuthApiError::MalformedResponse(e.to_string()))
    }
}

async fn reject_failure(response: Response) -> Result<Response, AuthApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AuthApiError::Rejected {
        status: status.as_u16(),
        detail: extract_detail(&body),
    })
}
