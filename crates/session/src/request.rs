//! Transport-agnostic request hooks

use crate::error::{SessionError, SessionResult};
use http::StatusCode;
use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};

/// An outgoing request whose headers the session may rewrite
pub trait AuthorizeRequest {
    fn headers_mut(&mut self) -> &mut HeaderMap;
}

impl<B> AuthorizeRequest for http::Request<B> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        http::Request::headers_mut(self)
    }
}

impl AuthorizeRequest for HeaderMap {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self
    }
}

impl AuthorizeRequest for &mut HeaderMap {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut **self
    }
}

/// A failed response as seen by the session
pub trait ResponseFailure {
    /// HTTP status, or `None` when no response arrived
    fn status(&self) -> Option<StatusCode>;

    fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// A request plus its retry guard
#[derive(Debug, Clone)]
pub struct Attempt<R> {
    request: R,
    retried: bool,
}

impl<R> Attempt<R> {
    /// First attempt of a request
    pub fn new(request: R) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    /// Whether this request has already been reissued once
    pub fn is_retry(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub fn request(&self) -> &R {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut R {
        &mut self.request
    }

    pub fn into_request(self) -> R {
        self.request
    }
}

/// Set `Authorization: Bearer <token>` on a request
pub fn set_bearer<R: AuthorizeRequest + ?Sized>(request: &mut R, token: &str) -> SessionResult<()> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| SessionError::TokenInvalid("token is not a valid header value".into()))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// Bearer token currently attached to a request
pub fn bearer_token<R: AuthorizeRequest + ?Sized>(request: &mut R) -> Option<String> {
    request
        .headers_mut()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}
