use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::instrument;

use super::SessionView;
use crate::auth::RequestSession;

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses (
        (status = 200, description = "Signed-in session", body = SessionView),
        (status = 204, description = "No session"),
    ),
    tag = "auth",
)]
#[instrument(skip(session))]
pub async fn session(session: RequestSession) -> Response {
    match session.get_server_user().await {
        Some(user) => Json(SessionView::from(user)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
