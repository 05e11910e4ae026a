//! Maps validated CLI matches to the [`Action`] to execute.

use crate::cli::actions::{account, server, Action};
use crate::cli::commands::{
    account::{ARG_CODE, ARG_EMAIL, ARG_GOOGLE, ARG_PASSWORD, CMD_CONFIRM, CMD_SIGN_IN, CMD_SIGN_UP},
    identity,
    server::{ARG_PORT, CMD_SERVE},
};
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("missing required argument: --{id}"))
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let identity = identity::Options::parse(matches)?;

    match matches.subcommand() {
        Some((CMD_SERVE, sub)) => Ok(Action::Server(server::Args {
            port: sub.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
            identity,
        })),
        Some((CMD_SIGN_IN, sub)) => {
            let request = if sub.get_flag(ARG_GOOGLE) {
                account::SignIn::Google
            } else if let Some(code) = sub.get_one::<String>(ARG_CODE) {
                account::SignIn::RedirectCode(code.clone())
            } else {
                account::SignIn::Email {
                    email: required(sub, ARG_EMAIL)?,
                    password: SecretString::from(required(sub, ARG_PASSWORD)?),
                }
            };
            Ok(Action::SignIn(account::Args { identity }, request))
        }
        Some((CMD_SIGN_UP, sub)) => Ok(Action::SignUp(
            account::Args { identity },
            required(sub, ARG_EMAIL)?,
            SecretString::from(required(sub, ARG_PASSWORD)?),
        )),
        Some((CMD_CONFIRM, sub)) => Ok(Action::Confirm(
            account::Args { identity },
            required(sub, ARG_EMAIL)?,
            required(sub, ARG_CODE)?,
        )),
        Some((name, _)) => bail!("unknown command: {name}"),
        None => bail!("missing command"),
    }
}
