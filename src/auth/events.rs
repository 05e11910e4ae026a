//! Auth events pushed by the identity provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of provider events. Handlers match on it exhaustively, so adding
/// a variant is a compile error everywhere an event is consumed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AuthEvent {
    #[serde(rename = "signedIn")]
    SignedIn,
    #[serde(rename = "signedOut")]
    SignedOut,
    #[serde(rename = "tokenRefresh")]
    TokenRefreshed,
    #[serde(rename = "tokenRefresh_failure")]
    TokenRefreshFailed,
    #[serde(rename = "signInWithRedirect")]
    RedirectSignInCompleted,
    #[serde(rename = "signInWithRedirect_failure")]
    RedirectSignInFailed,
}

impl AuthEvent {
    pub const ALL: [Self; 6] = [
        Self::SignedIn,
        Self::SignedOut,
        Self::TokenRefreshed,
        Self::TokenRefreshFailed,
        Self::RedirectSignInCompleted,
        Self::RedirectSignInFailed,
    ];

    /// Name used on the provider's event channel.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::SignedIn => "signedIn",
            Self::SignedOut => "signedOut",
            Self::TokenRefreshed => "tokenRefresh",
            Self::TokenRefreshFailed => "tokenRefresh_failure",
            Self::RedirectSignInCompleted => "signInWithRedirect",
            Self::RedirectSignInFailed => "signInWithRedirect_failure",
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnknownEvent(pub String);

impl fmt::Display for UnknownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown auth event: {}", self.0)
    }
}

impl std::error::Error for UnknownEvent {}

impl FromStr for AuthEvent {
    type Err = UnknownEvent;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.wire_name() == name)
            .ok_or_else(|| UnknownEvent(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_parse_back() {
        for event in AuthEvent::ALL {
            assert_eq!(event.wire_name().parse::<AuthEvent>(), Ok(event));
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            "customOAuthState".parse::<AuthEvent>(),
            Err(UnknownEvent("customOAuthState".to_string()))
        );
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&AuthEvent::TokenRefreshFailed).unwrap(),
            "\"tokenRefresh_failure\""
        );
        let event: AuthEvent = serde_json::from_str("\"signInWithRedirect\"").unwrap();
        assert_eq!(event, AuthEvent::RedirectSignInCompleted);
    }
}
