pub mod health;
pub mod pages;
pub mod session;
pub mod user;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::resolver::ServerUser;

/// Group whose members may open the admin area.
pub const ADMIN_GROUP: &str = "ADMINS";

/// JSON error body, `{ "error": "..." }`.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Public view of a resolved session.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub groups: Vec<String>,
}

impl From<ServerUser> for SessionView {
    fn from(server_user: ServerUser) -> Self {
        Self {
            user_id: server_user.user.user_id,
            email: server_user.user.email,
            name: server_user.user.name,
            groups: server_user.groups,
        }
    }
}
