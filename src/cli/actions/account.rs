use crate::{
    auth::{
        orchestrator::Navigator,
        provider::{Credentials, SignInMethod, SocialProvider},
        AuthOutcome, Orchestrator, OrchestratorConfig,
    },
    cli::commands::identity,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub identity: identity::Options,
}

#[derive(Debug)]
pub enum SignIn {
    Email {
        email: String,
        password: SecretString,
    },
    Google,
    /// Authorization code from the redirect URI of a social sign-in.
    RedirectCode(String),
}

/// Keeps the last location the orchestrator navigated to.
#[derive(Default)]
struct LastLocation(Mutex<Option<String>>);

impl Navigator for LastLocation {
    fn navigate(&self, path: &str) {
        info!(location = path, "navigate");
        if let Ok(mut location) = self.0.lock() {
            *location = Some(path.to_string());
        }
    }
}

impl LastLocation {
    fn get(&self) -> Option<String> {
        self.0.lock().ok().and_then(|location| location.clone())
    }
}

fn orchestrator(args: &Args, navigator: Arc<LastLocation>) -> Result<Arc<Orchestrator>> {
    let provider = args
        .identity
        .provider
        .build()
        .context("failed to build identity provider")?;
    let config =
        OrchestratorConfig::new().with_degraded_sessions(args.identity.allow_degraded_sessions);
    let orchestrator = Arc::new(Orchestrator::new(provider, navigator, config));
    orchestrator.spawn_event_listener();
    Ok(orchestrator)
}

fn report(outcome: AuthOutcome, navigator: &LastLocation) -> Result<()> {
    match outcome {
        AuthOutcome::Success(user) => {
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(())
        }
        AuthOutcome::NeedsConfirmation(email) => {
            println!("Confirmation required for {email}; run `tpauth confirm` with the emailed code.");
            Ok(())
        }
        AuthOutcome::NeedsAdditionalStep(step) => {
            println!("Additional sign-in step required: {step}");
            Ok(())
        }
        AuthOutcome::Redirecting => {
            let location = navigator
                .get()
                .context("sign-in redirect did not produce a location")?;
            println!("{location}");
            Ok(())
        }
        AuthOutcome::Failure(err) => Err(anyhow!(err)),
    }
}

/// # Errors
/// Returns an error if the provider cannot be built or sign-in fails.
pub async fn sign_in(args: Args, request: SignIn) -> Result<()> {
    let navigator = Arc::new(LastLocation::default());
    let orchestrator = orchestrator(&args, Arc::clone(&navigator))?;

    let outcome = match request {
        SignIn::Google => {
            orchestrator
                .sign_in(SignInMethod::Social(SocialProvider::Google), None)
                .await
        }
        SignIn::RedirectCode(code) => orchestrator.complete_redirect_sign_in(&code).await,
        SignIn::Email { email, password } => {
            debug!(email = %email, "signing in");
            let credentials = Credentials { email, password };
            orchestrator
                .sign_in(SignInMethod::Email, Some(credentials))
                .await
        }
    };

    report(outcome, &navigator)
}

/// # Errors
/// Returns an error if the provider cannot be built or sign-up fails.
pub async fn sign_up(args: Args, email: &str, password: SecretString) -> Result<()> {
    let navigator = Arc::new(LastLocation::default());
    let orchestrator = orchestrator(&args, Arc::clone(&navigator))?;
    let outcome = orchestrator.sign_up(email, password).await;
    report(outcome, &navigator)
}

/// # Errors
/// Returns an error if the provider cannot be built or rejects the code.
pub async fn confirm(args: Args, email: &str, code: &str) -> Result<()> {
    let navigator = Arc::new(LastLocation::default());
    let orchestrator = orchestrator(&args, navigator)?;
    orchestrator.confirm_sign_up(email, code).await?;
    println!("Email confirmed. You can now sign in.");
    Ok(())
}
