//! Pesa HTTP client

pub mod accounts;
pub mod auth;
pub mod contact;
pub mod error;
pub mod payments;

use crate::config::ApiConfig;
use auth::AuthApiClient;
use error::ClientError;
use pesa_session::{
    Attempt, AuthorizeRequest, MemoryStorage, SessionConfig, SessionManager, TokenStorage,
};
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A built request the session can authorize
#[derive(Debug)]
pub struct OutgoingRequest(reqwest::Request);

impl OutgoingRequest {
    pub fn into_inner(self) -> reqwest::Request {
        self.0
    }

    fn try_clone(&self) -> Option<Self> {
        self.0.try_clone().map(Self)
    }
}

impl AuthorizeRequest for OutgoingRequest {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.0.headers_mut()
    }
}

/// Pesa API client
///
/// Requests to protected endpoints go through [`Self::send`], which lets the
/// session attach and refresh the bearer token.
#[derive(Clone)]
pub struct PesaClient {
    client: Client,
    base_url: String,
    session: SessionManager,
}

impl PesaClient {
    /// Create a client with an in-memory session
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        Self::builder().config(config.clone()).build()
    }

    /// Create a new client builder
    pub fn builder() -> PesaClientBuilder {
        PesaClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Create a request builder for a path under the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Send a request on behalf of the session
    ///
    /// A first 401 is answered with one token refresh and one retry.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = OutgoingRequest(request.build()?);
        let request = self.session.decorate_request(request).await?;

        let Some(retry) = request.try_clone() else {
            return dispatch(&self.client, request.into_inner()).await;
        };

        match dispatch(&self.client, request.into_inner()).await {
            Ok(response) => Ok(response),
            Err(error) => {
                let client = self.client.clone();
                self.session
                    .handle_response_error(Attempt::new(retry), error, |attempt| async move {
                        dispatch(&client, attempt.into_request().into_inner()).await
                    })
                    .await
            }
        }
    }

    /// Send a request to a public endpoint, without credentials
    pub async fn send_public(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        dispatch(&self.client, request.build()?).await
    }

    /// Send an authorized request and decode the JSON response
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        decode(response).await
    }

    /// Send a public request and decode the JSON response
    pub async fn execute_public<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send_public(request).await?;
        decode(response).await
    }
}

async fn dispatch(client: &Client, request: reqwest::Request) -> Result<Response, ClientError> {
    debug!(method = %request.method(), path = request.url().path(), "Sending request");
    let response = client.execute(request).await?;
    let status = response.status();

    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::from_status(status, message))
    }
}

// Empty bodies decode as JSON null so `()` and `Option<_>` responses work.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(serde_json::from_value(serde_json::Value::Null)?)
    } else {
        Ok(serde_json::from_slice(&body)?)
    }
}

pub(crate) fn build_http_client(config: &ApiConfig) -> Result<Client, ClientError> {
    let mut builder = ClientBuilder::new().user_agent(config.user_agent.clone());
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}

pub(crate) fn normalize_base_url(base_url: &str) -> Result<String, ClientError> {
    let parsed = Url::parse(base_url)
        .map_err(|e| ClientError::Configuration(format!("invalid base_url '{base_url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientError::Configuration(format!(
            "base_url must be http or https, got '{}'",
            parsed.scheme()
        )));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}

/// Builder for PesaClient
#[derive(Default)]
pub struct PesaClientBuilder {
    config: ApiConfig,
    storage: Option<Arc<dyn TokenStorage>>,
    session_config: SessionConfig,
    session: Option<SessionManager>,
}

impl PesaClientBuilder {
    /// Set the endpoint configuration
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Persist tokens in the given storage
    pub fn storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Use an existing session instead of creating one
    pub fn session(mut self, session: SessionManager) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the client
    ///
    /// The session is created but not initialized; call
    /// [`SessionManager::initialize`] to restore a stored session.
    pub fn build(self) -> Result<PesaClient, ClientError> {
        let base_url = normalize_base_url(&self.config.base_url)?;
        let client = build_http_client(&self.config)?;

        let session = match self.session {
            Some(session) => session,
            None => {
                let api = AuthApiClient::with_client(client.clone(), &base_url, &self.config);
                let storage = self
                    .storage
                    .unwrap_or_else(|| Arc::new(MemoryStorage::new()) as Arc<dyn TokenStorage>);
                SessionManager::new(Arc::new(api), storage, self.session_config)
            }
        };

        Ok(PesaClient {
            client,
            base_url,
            session,
        })
    }
}
