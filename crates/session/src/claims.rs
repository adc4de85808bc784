//! Identity claims carried by the access token

use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Claims decoded from an access token
///
/// The client never holds the signing key, so the signature is not checked
/// here; the server remains the authority on validity. Decoding only proves
/// the token is structurally sound and yields its expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Subject (user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// User ID as issued by Django simplejwt style backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
    /// Issued at (as UTC timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Any other claims
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionIdentity {
    /// Decode the claims of an access token
    pub fn decode(token: &str) -> SessionResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Self>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| SessionError::TokenInvalid(e.to_string()))
    }

    /// Subject identifier, falling back to `user_id`
    pub fn subject(&self) -> Option<String> {
        if let Some(sub) = &self.sub {
            return Some(sub.clone());
        }
        match &self.user_id {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }

    /// Custom claim by name
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Issue time as a timestamp
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| Utc.timestamp_opt(iat, 0).single())
    }

    /// Whether no more than `margin` of lifetime remains at `now`
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        let margin_ms = i64::try_from(margin.as_millis()).unwrap_or(i64::MAX);
        let remaining_ms = self
            .exp
            .saturating_mul(1000)
            .saturating_sub(now.timestamp_millis());
        remaining_ms <= margin_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn mint(claims: &Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_simplejwt_claims() {
        let exp = Utc::now().timestamp() + 300;
        let token = mint(&json!({
            "token_type": "access",
            "exp": exp,
            "iat": exp - 300,
            "jti": "abc123",
            "user_id": 42
        }));

        let identity = SessionIdentity::decode(&token).unwrap();
        assert_eq!(identity.exp, exp);
        assert_eq!(identity.subject().as_deref(), Some("42"));
        assert_eq!(identity.claim("token_type"), Some(&json!("access")));
        assert_eq!(identity.issued_at().map(|t| t.timestamp()), Some(exp - 300));
    }

    #[test]
    fn test_sub_takes_precedence() {
        let token = mint(&json!({"sub": "alice", "user_id": 7, "exp": 4_102_444_800_i64}));
        let identity = SessionIdentity::decode(&token).unwrap();
        assert_eq!(identity.subject().as_deref(), Some("alice"));
    }

    #[test]
    fn test_signature_not_required() {
        let token = mint(&json!({"sub": "bob", "exp": 4_102_444_800_i64}));
        let (unsigned, _) = token.rsplit_once('.').unwrap();
        let tampered = format!("{unsigned}.c2lnbmF0dXJl");
        assert!(SessionIdentity::decode(&tampered).is_ok());
    }

    #[test]
    fn test_expired_token_still_decodes() {
        let token = mint(&json!({"sub": "bob", "exp": 1_000}));
        let identity = SessionIdentity::decode(&token).unwrap();
        assert!(identity.expires_within(Duration::from_secs(5), Utc::now()));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        for token in ["", "not-a-jwt", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30"] {
            let result = SessionIdentity::decode(token);
            assert!(
                matches!(result, Err(SessionError::TokenInvalid(_))),
                "{token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_exp_rejected() {
        let token = mint(&json!({"sub": "carol"}));
        assert!(matches!(
            SessionIdentity::decode(&token),
            Err(SessionError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_expires_within_margin() {
        let now = Utc::now();
        let identity = |exp: i64| SessionIdentity {
            sub: None,
            user_id: None,
            exp,
            iat: None,
            extra: Map::new(),
        };
        let margin = Duration::from_secs(5);

        assert!(!identity(now.timestamp() + 60).expires_within(margin, now));
        assert!(identity(now.timestamp() + 2).expires_within(margin, now));
        assert!(identity(now.timestamp() - 10).expires_within(margin, now));
    }
}
