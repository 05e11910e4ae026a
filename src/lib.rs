//! # tpauth (authentication-state reconciliation)
//!
//! `tpauth` keeps three trust layers of the dashboard in agreement about who is
//! signed in:
//!
//! - **Edge gatekeeper:** a presence-only cookie check that runs before routing
//!   and redirects anonymous requests for protected paths to the sign-in page.
//! - **Server session resolver:** the authoritative, request-scoped lookup of the
//!   signed-in user against the identity provider. Failures collapse to "no user".
//! - **Client auth orchestrator:** the in-memory state machine that performs
//!   sign-in, sign-up, confirmation and sign-out, reacts to provider events, and
//!   compensates for the provider's session-creation race with bounded retries
//!   and a degraded-session fallback.
//!
//! The identity provider itself (Cognito, or an in-memory provider for local
//! development) sits behind the [`auth::provider::IdentityProvider`] trait and is
//! injected at construction time.

pub mod auth;
pub mod cli;
pub mod tpauth;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
