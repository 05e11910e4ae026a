//! Identity provider seam.
//!
//! The orchestrator only ever sees [`IdentityProvider`]; which implementation
//! backs it (Cognito or the in-memory local provider) is decided from
//! configuration when the orchestrator is built.

pub mod cognito;
pub mod local;

use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use super::events::AuthEvent;
use super::user::{CurrentUser, UserAttributes};

pub use cognito::{CognitoClient, CognitoConfig};
pub use local::LocalProvider;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Failures reported by provider operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("user does not exist")]
    UserNotFound,
    #[error("user is not confirmed")]
    UserNotConfirmed,
    #[error("there is already a signed in user")]
    AlreadyAuthenticated,
    #[error("sign-in was interrupted before the session was created")]
    SessionInterrupted,
    #[error("additional sign-in step required: {0}")]
    AdditionalStepRequired(String),
    #[error("user is not authenticated")]
    NotAuthenticated,
    #[error("{0}")]
    Unknown(String),
}

impl ProviderError {
    /// Map a provider exception name (optionally namespaced with `#`) to a kind.
    #[must_use]
    pub fn from_exception(name: &str, message: &str) -> Self {
        let name = name.rsplit('#').next().unwrap_or(name);
        match name {
            "UnexpectedSignInInterruptionException" => Self::SessionInterrupted,
            "UserAlreadyAuthenticatedException" => Self::AlreadyAuthenticated,
            "UserNotFoundException" => Self::UserNotFound,
            "NotAuthorizedException" => Self::InvalidCredentials,
            "UserNotConfirmedException" => Self::UserNotConfirmed,
            "UserUnAuthenticatedException" => Self::NotAuthenticated,
            _ if message.is_empty() => Self::Unknown(name.to_string()),
            _ => Self::Unknown(message.to_string()),
        }
    }
}

/// Email/password pair submitted by the user. The password never leaves
/// [`SecretString`] except when sent to the provider.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Federated providers offered through redirect sign-in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SocialProvider {
    Google,
}

impl SocialProvider {
    #[must_use]
    pub const fn identity_provider_name(self) -> &'static str {
        match self {
            Self::Google => "Google",
        }
    }
}

/// How the user asked to sign in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignInMethod {
    Email,
    Social(SocialProvider),
}

/// Next step reported after credentials were accepted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignInStep {
    Done,
    ConfirmSignUp,
    /// Multi-factor or other continuation, identified by its step name.
    Additional(String),
}

/// Next step reported after sign-up or confirmation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignUpStep {
    Done,
    ConfirmSignUp,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Submit email/password credentials.
    async fn sign_in(&self, credentials: &Credentials) -> Result<SignInStep, ProviderError>;

    /// Start a redirect-based sign-in; returns the location to navigate to.
    async fn sign_in_with_redirect(&self, social: SocialProvider) -> Result<String, ProviderError>;

    /// Finish a redirect-based sign-in with the authorization `code` handed
    /// back to the redirect URI. Publishes `RedirectSignInCompleted` or
    /// `RedirectSignInFailed`.
    async fn complete_redirect_sign_in(&self, code: &str) -> Result<(), ProviderError>;

    async fn sign_up(&self, email: &str, password: &SecretString)
        -> Result<SignUpStep, ProviderError>;

    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<SignUpStep, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    async fn get_current_user(&self) -> Result<CurrentUser, ProviderError>;

    async fn fetch_user_attributes(&self) -> Result<UserAttributes, ProviderError>;

    /// Subscribe to the provider's auth events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Fan-out of provider events to every subscriber. Publishing with no
/// subscribers is not an error.
#[derive(Clone, Debug)]
pub struct EventHub {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: AuthEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        debug!(%event, receivers, "auth event published");
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }
}

/// Provider selected from configuration.
#[derive(Clone, Debug)]
pub enum ProviderConfig {
    /// In-memory accounts for local development.
    Local,
    Cognito(CognitoConfig),
}

impl ProviderConfig {
    /// Build the configured provider.
    ///
    /// # Errors
    /// Returns an error if the Cognito HTTP client cannot be created.
    pub fn build(&self) -> anyhow::Result<Arc<dyn IdentityProvider>> {
        Ok(match self {
            Self::Local => Arc::new(LocalProvider::new()),
            Self::Cognito(config) => Arc::new(CognitoClient::new(config.clone())?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_names_map_to_kinds() {
        assert_eq!(
            ProviderError::from_exception("UnexpectedSignInInterruptionException", ""),
            ProviderError::SessionInterrupted
        );
        assert_eq!(
            ProviderError::from_exception(
                "com.amazonaws.cognito.identity.idp.model#NotAuthorizedException",
                "Incorrect username or password."
            ),
            ProviderError::InvalidCredentials
        );
        assert_eq!(
            ProviderError::from_exception("UserAlreadyAuthenticatedException", "x"),
            ProviderError::AlreadyAuthenticated
        );
        assert_eq!(
            ProviderError::from_exception("CodeMismatchException", "Invalid code provided"),
            ProviderError::Unknown("Invalid code provided".to_string())
        );
        assert_eq!(
            ProviderError::from_exception("LimitExceededException", ""),
            ProviderError::Unknown("LimitExceededException".to_string())
        );
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials::new("a@b.com", "hunter2");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("a@b.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn event_hub_fans_out() {
        let hub = EventHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        hub.publish(AuthEvent::SignedIn);
        assert_eq!(first.recv().await.unwrap(), AuthEvent::SignedIn);
        assert_eq!(second.recv().await.unwrap(), AuthEvent::SignedIn);
    }

    #[test]
    fn event_hub_publish_without_subscribers() {
        EventHub::new().publish(AuthEvent::SignedOut);
    }
}
