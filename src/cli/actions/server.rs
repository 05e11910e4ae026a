use crate::{
    auth::{
        gatekeeper::Gatekeeper,
        provider::{cognito::CognitoApi, ProviderConfig},
        RouteTable, SessionResolver,
    },
    cli::commands::identity,
    tpauth,
};
use anyhow::{Context, Result};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub identity: identity::Options,
}

/// Session resolver matching the configured provider.
///
/// # Errors
/// Returns an error if the Cognito HTTP client cannot be built.
pub fn resolver(identity: &identity::Options) -> Result<SessionResolver> {
    Ok(match &identity.provider {
        ProviderConfig::Cognito(config) => SessionResolver::cognito(
            CognitoApi::new(config.clone()).context("failed to build Cognito client")?,
        ),
        ProviderConfig::Local => SessionResolver::cookie_payload(identity.session_cookie.clone()),
    })
}

/// Execute the server action.
/// # Errors
/// Returns an error if the resolver cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(port = args.port, provider = ?args.identity.provider, "starting server");

    let resolver = resolver(&args.identity)?;
    let gatekeeper = Gatekeeper::new(RouteTable::default())
        .with_cookie_name(args.identity.session_cookie.clone());

    tpauth::new(args.port, resolver, gatekeeper).await
}
