//! Account, profile and wallet endpoints

use super::PesaClient;
use super::error::ClientError;
use crate::types::{
    Listing, Profile, ProfileUpdate, Registration, SetPinRequest, Wallet, WalletEntry,
};
use reqwest::Method;
use serde_json::Value;

impl PesaClient {
    /// Create an account; does not log in
    pub async fn register(&self, registration: &Registration) -> Result<(), ClientError> {
        let request = self
            .request(Method::POST, "/api/accounts/register/")
            .json(registration);
        self.execute_public::<Value>(request).await?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<Profile, ClientError> {
        let request = self.request(Method::GET, "/api/accounts/profile/");
        self.execute(request).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ClientError> {
        if update.is_empty() {
            return Err(ClientError::InvalidInput("nothing to update".into()));
        }
        let request = self
            .request(Method::PUT, "/api/accounts/profile/")
            .json(update);
        self.execute(request).await
    }

    pub async fn wallet(&self) -> Result<Wallet, ClientError> {
        let request = self.request(Method::GET, "/api/accounts/wallet/");
        self.execute(request).await
    }

    /// Wallet movements, newest first as returned by the server
    pub async fn wallet_history(&self) -> Result<Vec<WalletEntry>, ClientError> {
        let request = self.request(Method::GET, "/api/accounts/wallet/history/");
        let listing: Listing<WalletEntry> = self.execute(request).await?;
        Ok(listing.into_items())
    }

    /// Set the 4-digit wallet PIN
    pub async fn set_wallet_pin(&self, pin: &str) -> Result<(), ClientError> {
        validate_pin(pin)?;
        let request = self
            .request(Method::POST, "/api/accounts/wallet/set-pin/")
            .json(&SetPinRequest { pin });
        self.execute::<Value>(request).await?;
        Ok(())
    }
}

pub(crate) fn validate_pin(pin: &str) -> Result<(), ClientError> {
    if pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ClientError::InvalidInput("PIN must be exactly 4 digits".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pin() {
        assert!(validate_pin("0420").is_ok());
        for pin in ["123", "12345", "12a4", "", "１２３４"] {
            assert!(
                matches!(validate_pin(pin), Err(ClientError::InvalidInput(_))),
                "{pin:?} accepted"
            );
        }
    }
}
