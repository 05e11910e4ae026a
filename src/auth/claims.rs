//! Unverified decoding of Cognito JWT payloads.
//!
//! Signature checks are the identity provider's job: every token read here has
//! either just been issued to us over TLS or is validated by a provider call
//! (`GetUser`) before any claim is trusted.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

/// Claims read from Cognito ID and access tokens.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "cognito:username")]
    pub cognito_username: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "cognito:groups")]
    pub groups: Vec<String>,
}

impl TokenClaims {
    /// Decode the payload segment of a compact JWT.
    ///
    /// # Errors
    /// Returns an error if the token is not three dot-separated segments or the
    /// payload is not base64url JSON.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(ClaimsError::TokenFormat);
        };
        let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('='))
            .map_err(|_| ClaimsError::Base64)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Username as Cognito reports it (ID tokens use `cognito:username`, access
    /// tokens use `username`), falling back to `sub`.
    #[must_use]
    pub fn username(&self) -> &str {
        self.cognito_username
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.sub)
    }

    /// Whether `exp` has passed, allowing `leeway_seconds` of clock skew.
    /// Tokens without `exp` are treated as expired.
    #[must_use]
    pub fn is_expired(&self, leeway_seconds: u64) -> bool {
        let Some(exp) = self.exp else {
            return true;
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        exp.saturating_add(leeway_seconds) <= now
    }
}

#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = Base64UrlUnpadded::encode_string(claims.to_string().as_bytes());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_reads_cognito_claims() {
        let token = encode_unsigned(&json!({
            "sub": "abc-123",
            "exp": 4_102_444_800_u64,
            "email": "a@b.com",
            "cognito:username": "alice",
            "cognito:groups": ["ADMINS", "ANALYSTS"],
        }));
        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.sub, "abc-123");
        assert_eq!(claims.username(), "alice");
        assert_eq!(claims.email.as_deref(), Some("a@b.com"));
        assert_eq!(claims.groups, vec!["ADMINS", "ANALYSTS"]);
        assert!(!claims.is_expired(0));
    }

    #[test]
    fn username_falls_back_to_sub() {
        let token = encode_unsigned(&json!({ "sub": "only-sub", "exp": 1 }));
        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.username(), "only-sub");
        assert!(claims.is_expired(60));
    }

    #[test]
    fn missing_exp_counts_as_expired() {
        let token = encode_unsigned(&json!({ "sub": "s" }));
        assert!(TokenClaims::decode(&token).unwrap().is_expired(0));
    }

    #[test]
    fn decode_rejects_malformed_tokens() {
        assert!(matches!(
            TokenClaims::decode("only.two"),
            Err(ClaimsError::TokenFormat)
        ));
        assert!(matches!(
            TokenClaims::decode("a.b.c.d"),
            Err(ClaimsError::TokenFormat)
        ));
        assert!(matches!(
            TokenClaims::decode("a.!!!.c"),
            Err(ClaimsError::Base64)
        ));
        let not_json = Base64UrlUnpadded::encode_string(b"nope");
        assert!(matches!(
            TokenClaims::decode(&format!("a.{not_json}.c")),
            Err(ClaimsError::Json(_))
        ));
    }
}
