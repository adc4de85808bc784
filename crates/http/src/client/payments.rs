//! Deposits, transfers and the transaction ledger

use super::PesaClient;
use super::accounts::validate_pin;
use super::error::ClientError;
use crate::types::{Listing, StkPushRequest, Transaction, TransactionFilter, TransferRequest};
use reqwest::Method;
use rust_decimal::Decimal;
use serde_json::Value;

impl PesaClient {
    /// Ask M-Pesa to prompt `phone` for a deposit of `amount` whole shillings
    ///
    /// Returns the server's acknowledgement as-is.
    pub async fn stk_push(&self, phone: &str, amount: u64) -> Result<Value, ClientError> {
        if phone.trim().is_empty() {
            return Err(ClientError::InvalidInput("phone number is required".into()));
        }
        if amount == 0 {
            return Err(ClientError::InvalidInput("amount must be positive".into()));
        }
        let request = self
            .request(Method::POST, "/api/mpesa/stk-push/")
            .json(&StkPushRequest { phone, amount });
        self.execute(request).await
    }

    pub async fn transfer(&self, transfer: &TransferRequest) -> Result<Value, ClientError> {
        if transfer.recipient.trim().is_empty() {
            return Err(ClientError::InvalidInput("recipient is required".into()));
        }
        if transfer.amount <= Decimal::ZERO {
            return Err(ClientError::InvalidInput("amount must be positive".into()));
        }
        validate_pin(&transfer.pin)?;
        let request = self.request(Method::POST, "/api/transfer/").json(transfer);
        self.execute(request).await
    }

    pub async fn transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ClientError> {
        let request = self
            .request(Method::GET, "/api/transactions/")
            .query(&filter.query());
        let listing: Listing<Transaction> = self.execute(request).await?;
        Ok(listing.into_items())
    }
}
