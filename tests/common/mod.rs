#![allow(dead_code)]

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tpauth::auth::orchestrator::Navigator;
use tpauth::auth::provider::{
    Credentials, EventHub, IdentityProvider, ProviderError, SignInStep, SignUpStep, SocialProvider,
};
use tpauth::auth::user::{CurrentUser, UserAttributes};
use tpauth::auth::{AuthEvent, Orchestrator, OrchestratorConfig};

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "correct horse";

/// Provider whose answers are queued up front. Empty queues fall back to the
/// configured default.
pub struct ScriptedProvider {
    sign_in: Mutex<VecDeque<Result<SignInStep, ProviderError>>>,
    current_user: Mutex<VecDeque<(Duration, Result<CurrentUser, ProviderError>)>>,
    default_user: Mutex<Result<CurrentUser, ProviderError>>,
    attributes: Mutex<Result<UserAttributes, ProviderError>>,
    sign_up: Mutex<Result<SignUpStep, ProviderError>>,
    confirm: Mutex<Result<SignUpStep, ProviderError>>,
    sign_out: Mutex<Result<(), ProviderError>>,
    redirect: Mutex<Result<String, ProviderError>>,
    callback: Mutex<Result<(), ProviderError>>,
    submitted_email: Mutex<Option<String>>,
    pub sign_in_calls: AtomicUsize,
    pub current_user_calls: AtomicUsize,
    pub attribute_calls: AtomicUsize,
    events: EventHub,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            sign_in: Mutex::new(VecDeque::new()),
            current_user: Mutex::new(VecDeque::new()),
            default_user: Mutex::new(Ok(current_user("user-1"))),
            attributes: Mutex::new(Ok(attributes(EMAIL, Some("Alice")))),
            sign_up: Mutex::new(Ok(SignUpStep::ConfirmSignUp)),
            confirm: Mutex::new(Ok(SignUpStep::Done)),
            sign_out: Mutex::new(Ok(())),
            redirect: Mutex::new(Ok("https://auth.example.com/oauth2/authorize".to_string())),
            callback: Mutex::new(Ok(())),
            submitted_email: Mutex::new(None),
            sign_in_calls: AtomicUsize::new(0),
            current_user_calls: AtomicUsize::new(0),
            attribute_calls: AtomicUsize::new(0),
            events: EventHub::new(),
        }
    }
}

impl ScriptedProvider {
    pub fn push_sign_in(&self, step: Result<SignInStep, ProviderError>) -> &Self {
        self.sign_in.lock().unwrap().push_back(step);
        self
    }

    pub fn push_current_user(&self, result: Result<CurrentUser, ProviderError>) -> &Self {
        self.push_current_user_after(Duration::ZERO, result)
    }

    pub fn push_current_user_after(
        &self,
        delay: Duration,
        result: Result<CurrentUser, ProviderError>,
    ) -> &Self {
        self.current_user.lock().unwrap().push_back((delay, result));
        self
    }

    pub fn set_default_user(&self, result: Result<CurrentUser, ProviderError>) -> &Self {
        *self.default_user.lock().unwrap() = result;
        self
    }

    pub fn set_attributes(&self, result: Result<UserAttributes, ProviderError>) -> &Self {
        *self.attributes.lock().unwrap() = result;
        self
    }

    pub fn set_sign_up(&self, result: Result<SignUpStep, ProviderError>) -> &Self {
        *self.sign_up.lock().unwrap() = result;
        self
    }

    pub fn set_confirm(&self, result: Result<SignUpStep, ProviderError>) -> &Self {
        *self.confirm.lock().unwrap() = result;
        self
    }

    pub fn set_sign_out(&self, result: Result<(), ProviderError>) -> &Self {
        *self.sign_out.lock().unwrap() = result;
        self
    }

    pub fn set_redirect(&self, result: Result<String, ProviderError>) -> &Self {
        *self.redirect.lock().unwrap() = result;
        self
    }

    pub fn set_callback(&self, result: Result<(), ProviderError>) -> &Self {
        *self.callback.lock().unwrap() = result;
        self
    }

    /// Email of the last credentials handed to `sign_in`.
    pub fn submitted_email(&self) -> Option<String> {
        self.submitted_email.lock().unwrap().clone()
    }

    pub fn emit(&self, event: AuthEvent) {
        self.events.publish(event);
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<SignInStep, ProviderError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        *self.submitted_email.lock().unwrap() = Some(credentials.email.clone());
        let step = self
            .sign_in
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SignInStep::Done));
        if step == Ok(SignInStep::Done) {
            self.events.publish(AuthEvent::SignedIn);
        }
        step
    }

    async fn sign_in_with_redirect(&self, _social: SocialProvider) -> Result<String, ProviderError> {
        self.redirect.lock().unwrap().clone()
    }

    async fn complete_redirect_sign_in(&self, _code: &str) -> Result<(), ProviderError> {
        let result = self.callback.lock().unwrap().clone();
        self.events.publish(if result.is_ok() {
            AuthEvent::RedirectSignInCompleted
        } else {
            AuthEvent::RedirectSignInFailed
        });
        result
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &SecretString,
    ) -> Result<SignUpStep, ProviderError> {
        self.sign_up.lock().unwrap().clone()
    }

    async fn confirm_sign_up(&self, _email: &str, _code: &str) -> Result<SignUpStep, ProviderError> {
        self.confirm.lock().unwrap().clone()
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let result = self.sign_out.lock().unwrap().clone();
        if result.is_ok() {
            self.events.publish(AuthEvent::SignedOut);
            // Let an event listener run before the caller resumes.
            tokio::task::yield_now().await;
        }
        result
    }

    async fn get_current_user(&self) -> Result<CurrentUser, ProviderError> {
        self.current_user_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.current_user.lock().unwrap().pop_front();
        match scripted {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => self.default_user.lock().unwrap().clone(),
        }
    }

    async fn fetch_user_attributes(&self) -> Result<UserAttributes, ProviderError> {
        self.attribute_calls.fetch_add(1, Ordering::SeqCst);
        self.attributes.lock().unwrap().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Navigator that remembers every location it was sent to.
#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.paths.lock().unwrap().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}

pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub navigator: Arc<RecordingNavigator>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_provider(ScriptedProvider::default(), config)
    }

    pub fn with_provider(provider: ScriptedProvider, config: OrchestratorConfig) -> Self {
        let provider = Arc::new(provider);
        let navigator = Arc::new(RecordingNavigator::default());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            config,
        ));
        Self {
            provider,
            navigator,
            orchestrator,
        }
    }
}

pub fn current_user(user_id: &str) -> CurrentUser {
    CurrentUser {
        user_id: user_id.to_string(),
        username: EMAIL.to_string(),
    }
}

pub fn attributes(email: &str, name: Option<&str>) -> UserAttributes {
    let mut attributes = UserAttributes::new();
    attributes.insert("email".to_string(), email.to_string());
    attributes.insert("sub".to_string(), "sub-1".to_string());
    if let Some(name) = name {
        attributes.insert("name".to_string(), name.to_string());
    }
    attributes
}

pub fn credentials(email: &str, password: &str) -> Credentials {
    Credentials::new(email, password)
}

/// Unsigned JWT with the given JSON payload.
pub fn unsigned_jwt(payload: &serde_json::Value) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
    let body = Base64UrlUnpadded::encode_string(payload.to_string().as_bytes());
    format!("{header}.{body}.signature")
}
