//! In-memory identity provider for local development.
//!
//! Used when no Cognito configuration is supplied. Accounts live in process
//! memory only; by default an unknown email is provisioned on first sign-in so
//! the dashboard can be exercised without a backend.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument};
use ulid::Ulid;

use super::{
    Credentials, EventHub, IdentityProvider, ProviderError, SignInStep, SignUpStep, SocialProvider,
};
use crate::auth::events::AuthEvent;
use crate::auth::routes::HOME_PATH;
use crate::auth::user::{CurrentUser, UserAttributes};

const SOCIAL_EMAIL: &str = "user@example.com";
const SOCIAL_NAME: &str = "Google User";

struct LocalAccount {
    user_id: String,
    password: SecretString,
    confirmed: bool,
    attributes: UserAttributes,
}

impl LocalAccount {
    fn new(email: &str, password: SecretString, confirmed: bool) -> Self {
        let user_id = Ulid::new().to_string();
        let mut attributes = UserAttributes::new();
        attributes.insert("sub".to_string(), user_id.clone());
        attributes.insert("email".to_string(), email.to_string());
        Self {
            user_id,
            password,
            confirmed,
            attributes,
        }
    }
}

#[derive(Default)]
struct LocalState {
    accounts: HashMap<String, LocalAccount>,
    signed_in: Option<String>,
}

pub struct LocalProvider {
    state: Mutex<LocalState>,
    events: EventHub,
    auto_provision: bool,
    confirmation_code: Option<String>,
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            events: EventHub::new(),
            auto_provision: true,
            confirmation_code: None,
        }
    }
}

impl LocalProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject unknown emails instead of provisioning them on sign-in.
    #[must_use]
    pub fn without_auto_provision(mut self) -> Self {
        self.auto_provision = false;
        self
    }

    /// Require sign-ups to be confirmed with `code` before they can sign in.
    #[must_use]
    pub fn with_confirmation_code(mut self, code: impl Into<String>) -> Self {
        self.confirmation_code = Some(code.into());
        self
    }

    /// Seed a confirmed account.
    #[must_use]
    pub fn with_account(mut self, email: &str, password: &str) -> Self {
        let account = LocalAccount::new(email, SecretString::from(password.to_string()), true);
        self.state.get_mut().accounts.insert(normalize(email), account);
        self
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for LocalProvider {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<SignInStep, ProviderError> {
        let email = normalize(&credentials.email);
        {
            let mut state = self.state.lock().await;
            if state.signed_in.is_some() {
                return Err(ProviderError::AlreadyAuthenticated);
            }
            if !state.accounts.contains_key(&email) {
                if !self.auto_provision {
                    return Err(ProviderError::UserNotFound);
                }
                info!("provisioning local account on first sign-in");
                let account = LocalAccount::new(&email, credentials.password.clone(), true);
                state.accounts.insert(email.clone(), account);
            }
            let Some(account) = state.accounts.get(&email) else {
                return Err(ProviderError::UserNotFound);
            };
            if account.password.expose_secret() != credentials.password.expose_secret() {
                return Err(ProviderError::InvalidCredentials);
            }
            if !account.confirmed {
                return Ok(SignInStep::ConfirmSignUp);
            }
            state.signed_in = Some(email);
        }
        self.events.publish(AuthEvent::SignedIn);
        Ok(SignInStep::Done)
    }

    #[instrument(skip(self))]
    async fn sign_in_with_redirect(&self, social: SocialProvider) -> Result<String, ProviderError> {
        {
            let mut state = self.state.lock().await;
            let account = state
                .accounts
                .entry(SOCIAL_EMAIL.to_string())
                .or_insert_with(|| {
                    let password = SecretString::from(String::new());
                    let mut account = LocalAccount::new(SOCIAL_EMAIL, password, true);
                    account
                        .attributes
                        .insert("name".to_string(), SOCIAL_NAME.to_string());
                    account
                });
            account.confirmed = true;
            state.signed_in = Some(SOCIAL_EMAIL.to_string());
        }
        debug!(
            provider = social.identity_provider_name(),
            "local redirect sign-in completed"
        );
        self.events.publish(AuthEvent::RedirectSignInCompleted);
        Ok(HOME_PATH.to_string())
    }

    /// The local redirect finishes immediately; a callback code only confirms
    /// the session that redirect opened.
    async fn complete_redirect_sign_in(&self, code: &str) -> Result<(), ProviderError> {
        let signed_in = self.state.lock().await.signed_in.is_some();
        if code.is_empty() || !signed_in {
            self.events.publish(AuthEvent::RedirectSignInFailed);
            return Err(ProviderError::NotAuthenticated);
        }
        self.events.publish(AuthEvent::RedirectSignInCompleted);
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SignUpStep, ProviderError> {
        let email = normalize(email);
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&email) {
            return Err(ProviderError::Unknown("User already exists".to_string()));
        }
        let confirmed = self.confirmation_code.is_none();
        state
            .accounts
            .insert(email.clone(), LocalAccount::new(&email, password.clone(), confirmed));
        Ok(if confirmed {
            SignUpStep::Done
        } else {
            SignUpStep::ConfirmSignUp
        })
    }

    #[instrument(skip(self, code))]
    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<SignUpStep, ProviderError> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(&normalize(email))
            .ok_or(ProviderError::UserNotFound)?;
        if let Some(expected) = &self.confirmation_code {
            if expected != code {
                return Err(ProviderError::Unknown(
                    "Invalid verification code provided, please try again.".to_string(),
                ));
            }
        }
        account.confirmed = true;
        Ok(SignUpStep::Done)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.state.lock().await.signed_in = None;
        self.events.publish(AuthEvent::SignedOut);
        Ok(())
    }

    async fn get_current_user(&self) -> Result<CurrentUser, ProviderError> {
        let state = self.state.lock().await;
        state
            .signed_in
            .as_ref()
            .and_then(|email| {
                state.accounts.get(email).map(|account| CurrentUser {
                    user_id: account.user_id.clone(),
                    username: email.clone(),
                })
            })
            .ok_or(ProviderError::NotAuthenticated)
    }

    async fn fetch_user_attributes(&self) -> Result<UserAttributes, ProviderError> {
        let state = self.state.lock().await;
        state
            .signed_in
            .as_ref()
            .and_then(|email| state.accounts.get(email))
            .map(|account| account.attributes.clone())
            .ok_or(ProviderError::NotAuthenticated)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
