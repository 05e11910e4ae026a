use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::ErrorBody;
use crate::auth::RequestSession;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdated {
    pub success: bool,
    pub message: String,
    pub user_id: String,
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorBody::new("Unauthorized"))).into_response()
}

#[utoipa::path(
    get,
    path = "/api/protected/user",
    responses (
        (status = 200, description = "Current user", body = Profile),
        (status = 401, description = "No session", body = ErrorBody),
    ),
    tag = "user",
)]
#[instrument(skip(session))]
pub async fn get_user(session: RequestSession) -> Response {
    let Some(server_user) = session.get_server_user().await else {
        return unauthorized();
    };
    Json(Profile {
        user_id: server_user.user.user_id,
        email: server_user.user.email,
        name: server_user.user.name,
    })
    .into_response()
}

#[utoipa::path(
    post,
    path = "/api/protected/user",
    responses (
        (status = 200, description = "Profile accepted", body = ProfileUpdated),
        (status = 400, description = "Body is not JSON", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody),
    ),
    tag = "user",
)]
#[instrument(skip(session, payload))]
pub async fn update_user(
    session: RequestSession,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let Some(server_user) = session.get_server_user().await else {
        return unauthorized();
    };
    if let Err(rejection) = payload {
        debug!("rejected profile update: {rejection}");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Invalid request body")),
        )
            .into_response();
    }
    Json(ProfileUpdated {
        success: true,
        message: "Profile updated successfully".to_string(),
        user_id: server_user.user.user_id,
    })
    .into_response()
}
