use clap::{Arg, ArgAction, Command};

pub const CMD_SIGN_IN: &str = "sign-in";
pub const CMD_SIGN_UP: &str = "sign-up";
pub const CMD_CONFIRM: &str = "confirm";

pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_CODE: &str = "code";
pub const ARG_GOOGLE: &str = "google";

fn email() -> Arg {
    Arg::new(ARG_EMAIL)
        .short('e')
        .long(ARG_EMAIL)
        .help("Account email")
        .env("TPAUTH_EMAIL")
}

fn password() -> Arg {
    Arg::new(ARG_PASSWORD)
        .long(ARG_PASSWORD)
        .help("Account password")
        .env("TPAUTH_PASSWORD")
        .hide_env_values(true)
}

#[must_use]
pub fn sign_in() -> Command {
    Command::new(CMD_SIGN_IN)
        .about("Sign in and print the resolved session")
        .arg(email().required_unless_present_any([ARG_GOOGLE, ARG_CODE]))
        .arg(password().required_unless_present_any([ARG_GOOGLE, ARG_CODE]))
        .arg(
            Arg::new(ARG_GOOGLE)
                .long(ARG_GOOGLE)
                .help("Start a Google sign-in and print the authorize URL")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_CODE)
                .long(ARG_CODE)
                .help("Finish a Google sign-in with the code returned to the redirect URI"),
        )
}

#[must_use]
pub fn sign_up() -> Command {
    Command::new(CMD_SIGN_UP)
        .about("Register a new account")
        .arg(email().required(true))
        .arg(password().required(true))
}

#[must_use]
pub fn confirm() -> Command {
    Command::new(CMD_CONFIRM)
        .about("Confirm a pending sign-up with the emailed code")
        .arg(email().required(true))
        .arg(
            Arg::new(ARG_CODE)
                .short('c')
                .long(ARG_CODE)
                .help("Confirmation code")
                .env("TPAUTH_CONFIRMATION_CODE")
                .required(true),
        )
}
