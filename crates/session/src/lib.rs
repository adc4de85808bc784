//! Pesa session management
//!
//! [`SessionManager`] owns the access/refresh token pair for one client. It
//! persists the pair through a [`TokenStorage`], talks to the identity and
//! refresh endpoints through an [`AuthApi`], and plugs into any HTTP
//! transport through two hooks:
//!
//! - [`SessionManager::decorate_request`] before each send, which attaches
//!   the bearer token and refreshes it first when it is about to expire
//! - [`SessionManager::handle_response_error`] on each failure, which turns a
//!   first 401 into one refresh and one retry
//!
//! Overlapping refreshes are coalesced into a single call to the refresh
//! endpoint whose result every waiter shares.

pub mod api;
pub mod claims;
pub mod config;
pub mod error;
pub mod manager;
pub mod request;
pub mod storage;

pub use api::{AuthApi, Credentials, TokenPair};
pub use claims::SessionIdentity;
pub use config::{AuthConfig, SessionConfig};
pub use error::{AuthApiError, SessionError, SessionResult, StorageError};
pub use manager::{AuthenticationState, SessionManager};
pub use request::{Attempt, AuthorizeRequest, ResponseFailure, bearer_token, set_bearer};
pub use storage::{FileStorage, MemoryStorage, TokenStorage};
