//! Authentication core: route classification, session cookies, the identity
//! provider seam, and the three layers built on top of it.
//!
//! Flow Overview: a request first meets the [`gatekeeper`], which only checks
//! that a session cookie is present. Handlers then ask the [`resolver`] for the
//! authoritative user; any failure there is "no user". In-page actions go
//! through the [`orchestrator`], which talks to the [`provider`] and keeps its
//! published state in line with provider events.
//!
//! Security boundaries: the gatekeeper is a fast filter, not an access check.
//! Degraded sessions produced by the orchestrator are never verified sessions
//! and the server layer never sees them.

pub mod claims;
pub mod error;
pub mod events;
pub mod gatekeeper;
pub mod orchestrator;
pub mod provider;
pub mod resolver;
pub mod retry;
pub mod routes;
pub mod session;
pub mod user;

pub use error::AuthError;
pub use events::AuthEvent;
pub use orchestrator::{AuthOutcome, AuthSnapshot, AuthStatus, Orchestrator, OrchestratorConfig};
pub use provider::{IdentityProvider, ProviderError};
pub use resolver::{RequestSession, SessionResolver};
pub use retry::RetryPolicy;
pub use routes::RouteTable;
pub use user::{SessionKind, User};
