//! Session store: the cookies that carry a session between the browser and the
//! edge/server layers.
//!
//! The store is read-only from this crate's point of view. Cookies are written
//! by the identity provider's sign-in flow (or, in the simplified deployment, by
//! whoever issues the URL-encoded JSON payload). Parsing never fails loudly: an
//! unreadable header is treated as if no cookie was sent.

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "tp_session";
/// Prefix of the cookies written by the Cognito browser SDK.
pub const COGNITO_COOKIE_PREFIX: &str = "CognitoIdentityServiceProvider.";
const ACCESS_TOKEN_SUFFIX: &str = ".accessToken";
const LAST_AUTH_USER_SUFFIX: &str = ".LastAuthUser";

/// Request cookies keyed by name. Later duplicates do not override earlier ones.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    /// Collect cookies from every `Cookie` header. Headers that are not valid
    /// visible ASCII are skipped.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::default();
        for value in headers.get_all(COOKIE) {
            jar.extend_from_header(value);
        }
        jar
    }

    /// Parse a single `Cookie` header value.
    #[must_use]
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        let mut jar = Self::default();
        if let Some(value) = value {
            jar.extend_from_header(value);
        }
        jar
    }

    fn extend_from_header(&mut self, value: &HeaderValue) {
        let Ok(value) = value.to_str() else {
            return;
        };
        for pair in value.split(';') {
            let trimmed = pair.trim();
            let mut parts = trimmed.splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            self.cookies
                .entry(key.to_string())
                .or_insert_with(|| val.trim().to_string());
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Value of `name`, treating an empty value as absent.
    #[must_use]
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    /// Any non-empty Cognito access token cookie, regardless of client id or user.
    #[must_use]
    pub fn any_cognito_access_token(&self) -> Option<&str> {
        self.cookies
            .iter()
            .filter(|(name, _)| {
                name.starts_with(COGNITO_COOKIE_PREFIX) && name.ends_with(ACCESS_TOKEN_SUFFIX)
            })
            .map(|(_, value)| value.as_str())
            .find(|value| !value.is_empty())
    }

    /// Access token the Cognito SDK stored for the last signed-in user of `client_id`.
    #[must_use]
    pub fn cognito_access_token(&self, client_id: &str) -> Option<&str> {
        let base = format!("{COGNITO_COOKIE_PREFIX}{client_id}");
        let user = self.non_empty(&format!("{base}{LAST_AUTH_USER_SUFFIX}"))?;
        let user = urlencoding::decode(user).ok()?;
        self.non_empty(&format!("{base}.{user}{ACCESS_TOKEN_SUFFIX}"))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Bearer token from the `Authorization` header, if any.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Minimal identity carried by the session cookie in the simplified deployment.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl SessionPayload {
    /// Decode a cookie value holding URL-encoded JSON.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let decoded = urlencoding::decode(raw).ok()?;
        serde_json::from_str(&decoded).ok()
    }

    /// Encode into a cookie-safe value.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(urlencoding::encode(&json).into_owned())
    }
}
