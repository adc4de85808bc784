//! Request and response bodies of the banking API

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// New account details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub id_number: String,
    pub phone: String,
    pub address: String,
    /// ISO date, `YYYY-MM-DD`
    pub date_of_birth: String,
    #[serde(default)]
    pub bio: String,
}

/// Profile of the logged-in user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

/// Partial profile update; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: Decimal,
    #[serde(default)]
    pub has_pin: bool,
}

/// Entry of the wallet history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: Value,
    pub transaction_type: String,
    pub amount: Decimal,
    #[serde(default)]
    pub status: Option<String>,
    pub timestamp: String,
}

/// Paginated or bare list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Paginated { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub(crate) fn into_items(self) -> Vec<T> {
        match self {
            Self::Paginated { results } => results,
            Self::Bare(items) => items,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SetPinRequest<'a> {
    pub pin: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StkPushRequest<'a> {
    pub phone: &'a str,
    pub amount: u64,
}

/// Money transfer to another account holder
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub recipient: String,
    pub amount: Decimal,
    pub pin: String,
}

impl std::fmt::Debug for TransferRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferRequest")
            .field("recipient", &self.recipient)
            .field("amount", &self.amount)
            .field("pin", &"<redacted>")
            .finish()
    }
}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(format!("unknown transaction type '{other}'")),
        }
    }
}

/// Transaction list filters; unset filters are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// ISO date, inclusive
    pub start_date: Option<String>,
    /// ISO date, inclusive
    pub end_date: Option<String>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub kind: Option<TransactionKind>,
}

impl TransactionFilter {
    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                query.push((key, value));
            }
        };
        push("start_date", self.start_date.clone());
        push("end_date", self.end_date.clone());
        push("amount_min", self.amount_min.map(|a| a.to_string()));
        push("amount_max", self.amount_max.map(|a| a.to_string()));
        push("type", self.kind.map(|k| k.as_str().to_string()));
        query
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Value,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    #[serde(default)]
    pub status: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub sender_username: Option<String>,
    #[serde(default)]
    pub receiver_username: Option<String>,
}

/// Message for the support inbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ContactBody<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub message: String,
}

impl<'a> From<&'a ContactMessage> for ContactBody<'a> {
    fn from(contact: &'a ContactMessage) -> Self {
        Self {
            name: &contact.name,
            email: &contact.email,
            message: format!("Subject: {}\n\n{}", contact.subject, contact.message),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ContactReply {
    #[serde(default)]
    pub success: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
