//! User-facing auth errors. Only the client orchestrator surfaces these; the
//! edge and server layers collapse every failure into a redirect or "no user".

use serde::Serialize;
use thiserror::Error;

use super::provider::ProviderError;

/// Failure kinds the orchestrator reports, each rendering as the message shown
/// next to the form.
#[derive(Clone, Debug, Error, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AuthError {
    #[error("You are not signed in.")]
    NotAuthenticated,
    #[error("Incorrect email or password. Please try again.")]
    InvalidCredentials,
    #[error("No account found with this email. Please sign up first.")]
    UserNotFound,
    #[error("Please confirm your email first. Check your inbox for a verification code.")]
    UserNotConfirmed,
    #[error("Please confirm your email first. Check your inbox for a verification code.")]
    ConfirmationRequired,
    #[error("Additional verification required: {0}")]
    AdditionalStepRequired(String),
    #[error(
        "Authentication succeeded but session creation failed. Please refresh the page and try again."
    )]
    SessionCreationRace,
    #[error("Social sign in failed. Please try again.")]
    SocialSignInFailed,
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NetworkOrUnknown(String),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredentials => Self::InvalidCredentials,
            ProviderError::UserNotFound => Self::UserNotFound,
            ProviderError::UserNotConfirmed => Self::UserNotConfirmed,
            ProviderError::AdditionalStepRequired(step) => Self::AdditionalStepRequired(step),
            ProviderError::NotAuthenticated => Self::NotAuthenticated,
            ProviderError::SessionInterrupted => Self::SessionCreationRace,
            ProviderError::AlreadyAuthenticated => {
                Self::NetworkOrUnknown("There is already a signed in user.".to_string())
            }
            ProviderError::Unknown(message) if message.trim().is_empty() => {
                Self::NetworkOrUnknown("Sign in failed. Please try again.".to_string())
            }
            ProviderError::Unknown(message) => Self::NetworkOrUnknown(message),
        }
    }
}
