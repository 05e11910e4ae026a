//! User identity materialized by the auth layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;
use utoipa::ToSchema;

/// Provider attributes (`email`, `name`, `given_name`, `picture`, `sub`, ...).
pub type UserAttributes = BTreeMap<String, String>;

/// How much of the provider's verification stands behind a [`User`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Resolved through the provider's current-user and attribute calls.
    #[default]
    Verified,
    /// Built from a direct attribute fetch after session resolution kept failing.
    Recovered,
    /// Synthesized from submitted credentials alone. Not a verified session.
    Degraded,
}

/// Identity of the provider's signed-in user, as returned by `getCurrentUser`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: String,
    pub username: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    #[schema(value_type = Object)]
    pub attributes: UserAttributes,
    pub kind: SessionKind,
}

impl User {
    /// Materialize a verified user from the provider's answers.
    #[must_use]
    pub fn from_provider(current: &CurrentUser, attributes: UserAttributes) -> Self {
        let email = attributes.get("email").cloned().unwrap_or_default();
        Self {
            user_id: current.user_id.clone(),
            name: display_name(&attributes, &email),
            avatar: avatar(&attributes, &email),
            email,
            attributes,
            kind: SessionKind::Verified,
        }
    }

    /// Build a user from an attribute fetch made without a materialized session.
    /// Returns `None` when the attributes carry no email.
    #[must_use]
    pub fn recovered(attributes: UserAttributes) -> Option<Self> {
        let email = attributes.get("email").filter(|email| !email.is_empty())?.clone();
        let user_id = attributes
            .get("sub")
            .cloned()
            .unwrap_or_else(provisional_user_id);
        Some(Self {
            user_id,
            name: display_name(&attributes, &email),
            avatar: avatar(&attributes, &email),
            email,
            attributes,
            kind: SessionKind::Recovered,
        })
    }

    /// Synthesize a user from the submitted email alone.
    #[must_use]
    pub fn degraded(email: &str) -> Self {
        let mut attributes = UserAttributes::new();
        attributes.insert("email".to_string(), email.to_string());
        Self {
            user_id: provisional_user_id(),
            name: Some(local_part(email).to_string()),
            avatar: initial(email),
            email: email.to_string(),
            attributes,
            kind: SessionKind::Degraded,
        }
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.kind == SessionKind::Verified
    }
}

fn display_name(attributes: &UserAttributes, email: &str) -> Option<String> {
    attributes
        .get("name")
        .or_else(|| attributes.get("given_name"))
        .cloned()
        .or_else(|| (!email.is_empty()).then(|| local_part(email).to_string()))
}

fn avatar(attributes: &UserAttributes, email: &str) -> Option<String> {
    attributes.get("picture").cloned().or_else(|| initial(email))
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn initial(email: &str) -> Option<String> {
    email.chars().next().map(|c| c.to_uppercase().collect())
}

fn provisional_user_id() -> String {
    format!("session-{}", Ulid::new())
}
