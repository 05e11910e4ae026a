//! Client auth orchestrator.
//!
//! Owns the in-page view of the session and keeps it in line with the identity
//! provider. Callers drive it through [`Orchestrator::sign_in`],
//! [`Orchestrator::sign_up`], [`Orchestrator::sign_out`] and route changes;
//! the provider drives it through events. State is published as an
//! [`AuthSnapshot`] on a `watch` channel.
//!
//! Flow Overview:
//! 1. Every resolution takes a ticket from a monotonic counter and may only
//!    commit while its ticket is still the latest, so the most recently
//!    initiated check always wins.
//! 2. Sign-out bumps both the ticket and the session generation. In-flight
//!    checks become stale and sign-in retries stop, so nothing can bring the
//!    old session back.
//! 3. After the provider accepts credentials, resolution follows the
//!    configured [`RetryPolicy`]: bounded attempts, then the fallback chain.
//!
//! Security boundaries: a `Degraded` user is synthesized from the submitted
//! email after every provider lookup failed. It is flagged as such, never
//! reported as verified, and can be disabled with
//! [`OrchestratorConfig::with_degraded_sessions`].

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::error::AuthError;
use super::events::AuthEvent;
use super::provider::{
    Credentials, IdentityProvider, ProviderError, SignInMethod, SignInStep, SignUpStep,
    SocialProvider,
};
use super::retry::{Fallback, RetryPolicy, RetryableError};
use super::routes::{RouteTable, HOME_PATH};
use super::user::User;

/// Client-side navigation.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator for headless callers: records the location in the logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, path: &str) {
        info!(location = path, "navigate");
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum AuthStatus {
    #[default]
    Unknown,
    Checking,
    Authenticated(User),
    Unauthenticated,
}

/// Progress of the current sign-in attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignInPhase {
    SigningIn,
    Done,
    NeedsConfirmation,
    NeedsAdditionalStep(String),
    Failed,
}

/// Sign-up waiting for its confirmation code. The password is not kept.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingSignUp {
    pub email: String,
    pub confirmation_required: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    pub sign_in: Option<SignInPhase>,
    pub error: Option<AuthError>,
    pub pending_sign_up: Option<PendingSignUp>,
    pub loading: bool,
    /// Path the user is currently on.
    pub path: String,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            status: AuthStatus::Unknown,
            sign_in: None,
            error: None,
            pending_sign_up: None,
            loading: false,
            path: HOME_PATH.to_string(),
        }
    }
}

impl AuthSnapshot {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match &self.status {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

/// Result of a sign-in or sign-up operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthOutcome {
    Success(User),
    /// The account behind this email must be confirmed first.
    NeedsConfirmation(String),
    NeedsAdditionalStep(String),
    Failure(AuthError),
    /// Navigation to an external sign-in page was started.
    Redirecting,
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    routes: RouteTable,
    retry: RetryPolicy,
    allow_degraded_sessions: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            routes: RouteTable::default(),
            retry: RetryPolicy::default(),
            allow_degraded_sessions: true,
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether the last fallback may synthesize an unverified user.
    #[must_use]
    pub fn with_degraded_sessions(mut self, allow: bool) -> Self {
        self.allow_degraded_sessions = allow;
        self
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub fn allow_degraded_sessions(&self) -> bool {
        self.allow_degraded_sessions
    }
}

#[derive(Debug)]
enum AttemptError {
    Provider(ProviderError),
    /// A newer check committed first without producing a user.
    Superseded,
    SignedOut,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(err) => write!(f, "{err}"),
            Self::Superseded => f.write_str("superseded by a newer check"),
            Self::SignedOut => f.write_str("signed out during sign-in"),
        }
    }
}

impl RetryableError for AttemptError {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::SignedOut)
    }
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

fn validate_credentials(email: &str, password: &SecretString) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.expose_secret().is_empty() {
        return Err(AuthError::InvalidInput(
            "Email and password are required.".to_string(),
        ));
    }
    if !valid_email(email.trim()) {
        return Err(AuthError::InvalidInput(
            "Please enter a valid email address.".to_string(),
        ));
    }
    Ok(())
}

pub struct Orchestrator {
    provider: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    config: OrchestratorConfig,
    state: watch::Sender<AuthSnapshot>,
    ticket: AtomicU64,
    generation: AtomicU64,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        config: OrchestratorConfig,
    ) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        Self {
            provider,
            navigator,
            config,
            state,
            ticket: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    fn next_ticket(&self) -> u64 {
        self.ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn signed_out_since(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Apply `update` only if `ticket` is still the latest one.
    fn commit(&self, ticket: u64, update: impl FnOnce(&mut AuthSnapshot)) -> bool {
        self.state.send_if_modified(|snapshot| {
            if self.ticket.load(Ordering::SeqCst) != ticket {
                return false;
            }
            update(snapshot);
            true
        })
    }

    fn commit_user(&self, ticket: u64, user: &User) -> bool {
        self.commit(ticket, |snapshot| {
            snapshot.status = AuthStatus::Authenticated(user.clone());
        })
    }

    async fn resolve_user(&self) -> Result<User, ProviderError> {
        let current = self.provider.get_current_user().await?;
        let attributes = self.provider.fetch_user_attributes().await?;
        Ok(User::from_provider(&current, attributes))
    }

    /// Reconcile with the provider. On failure the state becomes
    /// unauthenticated and, off public pages, the user is sent to sign-in.
    /// Returns the user held once this check settles; a check overtaken by a
    /// newer one reports the current state instead of its own result.
    #[instrument(skip(self))]
    pub async fn check_auth_status(&self) -> Option<User> {
        let ticket = self.next_ticket();
        self.state.send_if_modified(|snapshot| {
            if snapshot.status == AuthStatus::Unknown {
                snapshot.status = AuthStatus::Checking;
                true
            } else {
                false
            }
        });

        match self.resolve_user().await {
            Ok(user) => {
                if self.commit_user(ticket, &user) {
                    debug!(user_id = %user.user_id, "session resolved");
                    Some(user)
                } else {
                    debug!(ticket, "stale check discarded");
                    self.user()
                }
            }
            Err(err) => {
                debug!("no session: {err}");
                let mut path = None;
                let committed = self.commit(ticket, |snapshot| {
                    snapshot.status = AuthStatus::Unauthenticated;
                    path = Some(snapshot.path.clone());
                });
                if let Some(path) = path.filter(|_| committed) {
                    if !self.config.routes.is_public(&path) {
                        self.navigator
                            .navigate(&self.config.routes.sign_in_redirect(&path));
                    }
                }
                None
            }
        }
    }

    /// Record a navigation and reconcile.
    pub async fn route_changed(&self, path: impl Into<String>) -> Option<User> {
        let path = path.into();
        self.state.send_if_modified(|snapshot| {
            if snapshot.path == path {
                return false;
            }
            snapshot.path = path;
            true
        });
        self.check_auth_status().await
    }

    fn settle(&self, outcome: &AuthOutcome, track_phase: bool) {
        let (phase, error) = match outcome {
            AuthOutcome::Success(_) => (Some(SignInPhase::Done), None),
            AuthOutcome::NeedsConfirmation(_) => (
                Some(SignInPhase::NeedsConfirmation),
                Some(AuthError::ConfirmationRequired),
            ),
            AuthOutcome::NeedsAdditionalStep(step) => (
                Some(SignInPhase::NeedsAdditionalStep(step.clone())),
                Some(AuthError::AdditionalStepRequired(step.clone())),
            ),
            AuthOutcome::Failure(err) => (Some(SignInPhase::Failed), Some(err.clone())),
            AuthOutcome::Redirecting => (None, None),
        };
        self.state.send_modify(|snapshot| {
            snapshot.loading = false;
            snapshot.error = error;
            if track_phase {
                snapshot.sign_in = phase;
            }
        });
    }

    fn complete(&self, user: User) -> AuthOutcome {
        self.state.send_modify(|snapshot| snapshot.pending_sign_up = None);
        self.navigator.navigate(HOME_PATH);
        AuthOutcome::Success(user)
    }

    /// Sign in with credentials or start a social redirect.
    #[instrument(skip(self, credentials))]
    pub async fn sign_in(
        &self,
        method: SignInMethod,
        credentials: Option<Credentials>,
    ) -> AuthOutcome {
        self.state.send_modify(|snapshot| {
            snapshot.error = None;
            snapshot.loading = true;
            snapshot.sign_in = Some(SignInPhase::SigningIn);
        });

        let outcome = match (method, credentials) {
            (SignInMethod::Social(social), _) => self.social_sign_in(social).await,
            (SignInMethod::Email, Some(credentials)) => self.credential_sign_in(credentials).await,
            (SignInMethod::Email, None) => AuthOutcome::Failure(AuthError::InvalidInput(
                "Email and password are required.".to_string(),
            )),
        };
        self.settle(&outcome, true);
        outcome
    }

    async fn social_sign_in(&self, social: SocialProvider) -> AuthOutcome {
        match self.provider.sign_in_with_redirect(social).await {
            Ok(location) => {
                info!(provider = social.identity_provider_name(), "redirecting to social sign-in");
                self.navigator.navigate(&location);
                AuthOutcome::Redirecting
            }
            Err(err) => {
                warn!("social sign-in could not start: {err}");
                AuthOutcome::Failure(AuthError::SocialSignInFailed)
            }
        }
    }

    /// Finish a social sign-in with the authorization `code` the provider
    /// handed back to the redirect URI.
    #[instrument(skip(self, code))]
    pub async fn complete_redirect_sign_in(&self, code: &str) -> AuthOutcome {
        self.state.send_modify(|snapshot| {
            snapshot.error = None;
            snapshot.loading = true;
            snapshot.sign_in = Some(SignInPhase::SigningIn);
        });

        let outcome = if code.trim().is_empty() {
            AuthOutcome::Failure(AuthError::InvalidInput(
                "Authorization code is required.".to_string(),
            ))
        } else {
            match self.provider.complete_redirect_sign_in(code.trim()).await {
                Ok(()) => match self.check_auth_status().await {
                    Some(user) => {
                        info!(user_id = %user.user_id, "redirect sign-in completed");
                        self.complete(user)
                    }
                    None => AuthOutcome::Failure(AuthError::SocialSignInFailed),
                },
                Err(err) => {
                    warn!("redirect sign-in could not complete: {err}");
                    AuthOutcome::Failure(AuthError::SocialSignInFailed)
                }
            }
        };
        self.settle(&outcome, true);
        outcome
    }

    async fn credential_sign_in(&self, credentials: Credentials) -> AuthOutcome {
        if let Err(err) = validate_credentials(&credentials.email, &credentials.password) {
            return AuthOutcome::Failure(err);
        }
        let email = credentials.email.trim().to_string();
        let credentials = Credentials {
            email: email.clone(),
            password: credentials.password,
        };
        let generation = self.generation.load(Ordering::SeqCst);

        match self.provider.sign_in(&credentials).await {
            Ok(SignInStep::Done) => self.resolve_after_sign_in(&email, generation).await,
            Ok(SignInStep::ConfirmSignUp) => {
                info!("sign-in needs sign-up confirmation");
                AuthOutcome::NeedsConfirmation(email)
            }
            Ok(SignInStep::Additional(step)) | Err(ProviderError::AdditionalStepRequired(step)) => {
                info!(step = %step, "sign-in needs an additional step");
                AuthOutcome::NeedsAdditionalStep(step)
            }
            Err(ProviderError::SessionInterrupted) => {
                warn!("sign-in accepted but session was not created; falling back");
                sleep(self.config.retry.interruption_settle()).await;
                self.run_fallbacks(&email, generation).await
            }
            Err(ProviderError::AlreadyAuthenticated) => match self.check_auth_status().await {
                Some(user) => self.complete(user),
                None => AuthOutcome::Failure(ProviderError::AlreadyAuthenticated.into()),
            },
            Err(err) => {
                debug!("sign-in rejected: {err}");
                AuthOutcome::Failure(err.into())
            }
        }
    }

    async fn resolve_after_sign_in(&self, email: &str, generation: u64) -> AuthOutcome {
        let resolved = self
            .config
            .retry
            .run(|attempt| async move {
                if self.signed_out_since(generation) {
                    return Err(AttemptError::SignedOut);
                }
                debug!(attempt, "resolving session after sign-in");
                let ticket = self.next_ticket();
                let user = self
                    .resolve_user()
                    .await
                    .map_err(AttemptError::Provider)?;
                if self.signed_out_since(generation) {
                    return Err(AttemptError::SignedOut);
                }
                if self.commit_user(ticket, &user) {
                    return Ok(user);
                }
                self.user().ok_or(AttemptError::Superseded)
            })
            .await;

        match resolved {
            Ok(user) => {
                info!(user_id = %user.user_id, "signed in");
                self.complete(user)
            }
            Err(AttemptError::SignedOut) => AuthOutcome::Failure(AuthError::NotAuthenticated),
            Err(_) => self.run_fallbacks(email, generation).await,
        }
    }

    async fn run_fallbacks(&self, email: &str, generation: u64) -> AuthOutcome {
        for fallback in self.config.retry.fallbacks() {
            if self.signed_out_since(generation) {
                return AuthOutcome::Failure(AuthError::NotAuthenticated);
            }
            match fallback {
                Fallback::FetchAttributes => {
                    let ticket = self.next_ticket();
                    match self.provider.fetch_user_attributes().await {
                        Ok(attributes) => {
                            if let Some(user) = User::recovered(attributes) {
                                if self.signed_out_since(generation) {
                                    return AuthOutcome::Failure(AuthError::NotAuthenticated);
                                }
                                self.commit_user(ticket, &user);
                                info!(user_id = %user.user_id, "session recovered from attributes");
                                return self.complete(user);
                            }
                            debug!("attribute fallback returned no email");
                        }
                        Err(err) => warn!("attribute fallback failed: {err}"),
                    }
                }
                Fallback::Synthesize => {
                    if !self.config.allow_degraded_sessions {
                        debug!("degraded sessions disabled");
                        continue;
                    }
                    let ticket = self.next_ticket();
                    let user = User::degraded(email);
                    self.commit_user(ticket, &user);
                    warn!(user_id = %user.user_id, "continuing with a degraded session");
                    return self.complete(user);
                }
            }
        }
        error!("session could not be created after sign-in");
        AuthOutcome::Failure(AuthError::SessionCreationRace)
    }

    /// Register a new account; signs in right away when no confirmation is needed.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: SecretString) -> AuthOutcome {
        self.state.send_modify(|snapshot| {
            snapshot.error = None;
            snapshot.loading = true;
        });
        if let Err(err) = validate_credentials(email, &password) {
            let outcome = AuthOutcome::Failure(err);
            self.settle(&outcome, false);
            return outcome;
        }
        let email = email.trim().to_string();

        let outcome = match self.provider.sign_up(&email, &password).await {
            Ok(SignUpStep::ConfirmSignUp) => {
                info!("sign-up awaiting confirmation");
                self.state.send_modify(|snapshot| {
                    snapshot.pending_sign_up = Some(PendingSignUp {
                        email: email.clone(),
                        confirmation_required: true,
                    });
                });
                AuthOutcome::NeedsConfirmation(email)
            }
            Ok(SignUpStep::Done) => {
                info!("sign-up confirmed, signing in");
                let credentials = Credentials {
                    email,
                    password,
                };
                return self.sign_in(SignInMethod::Email, Some(credentials)).await;
            }
            Err(err) => AuthOutcome::Failure(err.into()),
        };
        self.settle(&outcome, false);
        outcome
    }

    /// Confirm a pending sign-up. Never signs the user in.
    ///
    /// # Errors
    /// Returns the provider's rejection, or `InvalidInput` for empty fields.
    #[instrument(skip(self, code))]
    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), AuthError> {
        self.state.send_modify(|snapshot| {
            snapshot.error = None;
            snapshot.loading = true;
        });
        let result = if email.trim().is_empty() || code.trim().is_empty() {
            Err(AuthError::InvalidInput(
                "Email and verification code are required.".to_string(),
            ))
        } else {
            self.provider
                .confirm_sign_up(email.trim(), code.trim())
                .await
                .map_err(AuthError::from)
        };

        self.state.send_modify(|snapshot| {
            snapshot.loading = false;
            match &result {
                Ok(SignUpStep::Done) => {
                    snapshot.pending_sign_up = None;
                }
                Ok(SignUpStep::ConfirmSignUp) => {
                    snapshot.error = Some(AuthError::ConfirmationRequired);
                }
                Err(err) => snapshot.error = Some(err.clone()),
            }
        });
        match result {
            Ok(SignUpStep::Done) => {
                info!("sign-up confirmed");
                Ok(())
            }
            Ok(SignUpStep::ConfirmSignUp) => Err(AuthError::ConfirmationRequired),
            Err(err) => Err(err),
        }
    }

    fn clear_session(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.next_ticket();
        self.state.send_modify(|snapshot| {
            snapshot.status = AuthStatus::Unauthenticated;
            snapshot.sign_in = None;
            snapshot.pending_sign_up = None;
            snapshot.loading = false;
        });
    }

    /// Sign out. Local state is cleared before the provider is called and the
    /// user lands on the sign-in page even when the provider call fails.
    ///
    /// # Errors
    /// Returns the provider's failure after the local session was cleared.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.clear_session();
        let result = self.provider.sign_out().await;
        self.navigator.navigate(self.config.routes.sign_in_path());
        match result {
            Ok(()) => {
                info!("signed out");
                Ok(())
            }
            Err(err) => {
                warn!("provider sign-out failed: {err}");
                Err(err.into())
            }
        }
    }

    /// React to a provider event.
    pub async fn handle_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn => {
                let signing_in = self.state.borrow().sign_in == Some(SignInPhase::SigningIn);
                if signing_in {
                    debug!("signed in event during sign-in, resolution already underway");
                } else {
                    self.check_auth_status().await;
                }
            }
            AuthEvent::RedirectSignInCompleted => {
                info!("redirect sign-in completed");
                self.check_auth_status().await;
            }
            AuthEvent::SignedOut => {
                let already = self.state.borrow().status == AuthStatus::Unauthenticated;
                if already {
                    debug!("signed out event, session already cleared");
                } else {
                    self.clear_session();
                    self.navigator.navigate(self.config.routes.sign_in_path());
                }
            }
            AuthEvent::TokenRefreshed => debug!("auth tokens refreshed"),
            AuthEvent::TokenRefreshFailed => warn!("auth token refresh failed"),
            AuthEvent::RedirectSignInFailed => {
                error!("redirect sign-in failed");
                self.state.send_modify(|snapshot| {
                    snapshot.loading = false;
                    snapshot.sign_in = Some(SignInPhase::Failed);
                    snapshot.error = Some(AuthError::SocialSignInFailed);
                });
            }
        }
    }

    /// Pump provider events into [`Self::handle_event`]. The task ends once the
    /// orchestrator is dropped or the provider closes its channel.
    pub fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.provider.subscribe();
        let orchestrator = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let received = events.recv().await;
                let Some(orchestrator) = orchestrator.upgrade() else {
                    break;
                };
                match received {
                    Ok(event) => orchestrator.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth events lagged, reconciling");
                        orchestrator.check_auth_status().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
