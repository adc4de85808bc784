//! Pesa HTTP client
//!
//! A reqwest transport for the banking API. Protected calls are routed
//! through a [`pesa_session::SessionManager`], which attaches the bearer
//! token, refreshes it near expiry and retries once after a 401.

pub mod client;
pub mod config;
pub mod types;

pub use client::auth::AuthApiClient;
pub use client::error::ClientError;
pub use client::{OutgoingRequest, PesaClient, PesaClientBuilder};
pub use config::ApiConfig;
pub use types::{
    ContactMessage, Profile, ProfileUpdate, Registration, Transaction, TransactionFilter,
    TransactionKind, TransferRequest, Wallet, WalletEntry,
};
