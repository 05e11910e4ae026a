use anyhow::bail;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::auth::provider::{CognitoConfig, ProviderConfig};
use crate::auth::session::SESSION_COOKIE_NAME;

pub const ARG_PROVIDER: &str = "provider";
pub const ARG_REGION: &str = "region";
pub const ARG_CLIENT_ID: &str = "client-id";
pub const ARG_COGNITO_ENDPOINT: &str = "cognito-endpoint";
pub const ARG_HOSTED_UI_DOMAIN: &str = "hosted-ui-domain";
pub const ARG_REDIRECT_SIGN_IN: &str = "redirect-sign-in";
pub const ARG_SESSION_COOKIE: &str = "session-cookie";
pub const ARG_NO_DEGRADED_SESSIONS: &str = "no-degraded-sessions";

#[derive(Debug, Clone)]
pub struct Options {
    pub provider: ProviderConfig,
    pub session_cookie: String,
    pub allow_degraded_sessions: bool,
}

impl Options {
    /// Parse identity provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the Cognito provider is selected without a region or
    /// client id.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Helper to filter empty strings which clap might pass through if env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let provider = match get_non_empty(ARG_PROVIDER).as_deref() {
            Some("cognito") => {
                let Some(region) = get_non_empty(ARG_REGION) else {
                    bail!("missing required argument: --{ARG_REGION} (required for cognito)");
                };
                let Some(client_id) = get_non_empty(ARG_CLIENT_ID) else {
                    bail!("missing required argument: --{ARG_CLIENT_ID} (required for cognito)");
                };
                let mut config = CognitoConfig::new(region, client_id);
                if let Some(endpoint) = get_non_empty(ARG_COGNITO_ENDPOINT) {
                    config = config.with_endpoint(endpoint);
                }
                if let Some(domain) = get_non_empty(ARG_HOSTED_UI_DOMAIN) {
                    config = config.with_hosted_ui_domain(domain);
                }
                if let Some(redirect) = get_non_empty(ARG_REDIRECT_SIGN_IN) {
                    config = config.with_redirect_sign_in(redirect);
                }
                ProviderConfig::Cognito(config)
            }
            _ => ProviderConfig::Local,
        };

        Ok(Self {
            provider,
            session_cookie: get_non_empty(ARG_SESSION_COOKIE)
                .unwrap_or_else(|| SESSION_COOKIE_NAME.to_string()),
            allow_degraded_sessions: !matches.get_flag(ARG_NO_DEGRADED_SESSIONS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PROVIDER)
                .long(ARG_PROVIDER)
                .help("Identity provider backing sign-in and session lookups")
                .long_help(
                    "Identity provider backing sign-in and session lookups.\n\n`local` keeps accounts in memory and reads sessions from the URL-encoded JSON session cookie.\n`cognito` talks to the Cognito user pool client given by --region and --client-id.",
                )
                .default_value("local")
                .value_parser(["local", "cognito"])
                .env("TPAUTH_PROVIDER")
                .global(true),
        )
        .arg(
            Arg::new(ARG_REGION)
                .long(ARG_REGION)
                .help("Cognito user pool region, example: eu-west-1")
                .env("TPAUTH_COGNITO_REGION")
                .global(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_ID)
                .long(ARG_CLIENT_ID)
                .help("Cognito user pool app client id")
                .env("TPAUTH_COGNITO_CLIENT_ID")
                .global(true),
        )
        .arg(
            Arg::new(ARG_COGNITO_ENDPOINT)
                .long(ARG_COGNITO_ENDPOINT)
                .help("Override the Cognito Identity Provider endpoint")
                .env("TPAUTH_COGNITO_ENDPOINT")
                .global(true),
        )
        .arg(
            Arg::new(ARG_HOSTED_UI_DOMAIN)
                .long(ARG_HOSTED_UI_DOMAIN)
                .help("Cognito hosted UI domain used for social sign-in")
                .env("TPAUTH_COGNITO_DOMAIN")
                .global(true),
        )
        .arg(
            Arg::new(ARG_REDIRECT_SIGN_IN)
                .long(ARG_REDIRECT_SIGN_IN)
                .help("Redirect URI registered for social sign-in")
                .env("TPAUTH_REDIRECT_SIGN_IN")
                .global(true),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE)
                .long(ARG_SESSION_COOKIE)
                .help("Name of the session cookie")
                .default_value(SESSION_COOKIE_NAME)
                .env("TPAUTH_SESSION_COOKIE")
                .global(true),
        )
        .arg(
            Arg::new(ARG_NO_DEGRADED_SESSIONS)
                .long(ARG_NO_DEGRADED_SESSIONS)
                .help("Fail sign-in instead of synthesizing a session when the provider cannot resolve one")
                .env("TPAUTH_NO_DEGRADED_SESSIONS")
                .action(ArgAction::SetTrue)
                .global(true),
        )
}
