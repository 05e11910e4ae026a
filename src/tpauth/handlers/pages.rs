//! Server-rendered entry points. Each one re-checks the session with the
//! resolver; the edge gate only proved that a cookie exists.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::{ErrorBody, SessionView, ADMIN_GROUP};
use crate::auth::{RequestSession, RouteTable};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub greeting: String,
    pub user: SessionView,
}

async fn render(session: &RequestSession, routes: &RouteTable, path: &str, title: &str) -> Response {
    let Some(server_user) = session.get_server_user().await else {
        debug!(path, "cookie present but no server session");
        return Redirect::temporary(&routes.sign_in_redirect(path)).into_response();
    };
    let user = SessionView::from(server_user);
    Json(Page {
        title: title.to_string(),
        greeting: format!("Welcome, {}!", user.name.as_deref().unwrap_or(&user.email)),
        user,
    })
    .into_response()
}

#[utoipa::path(
    get,
    path = "/",
    responses (
        (status = 200, description = "Home page for the signed-in user", body = Page),
        (status = 307, description = "Redirect to sign-in"),
    ),
    tag = "pages",
)]
#[instrument(skip_all)]
pub async fn home(session: RequestSession, Extension(routes): Extension<RouteTable>) -> Response {
    render(&session, &routes, "/", "Home").await
}

#[utoipa::path(
    get,
    path = "/dashboard",
    responses (
        (status = 200, description = "Dashboard for the signed-in user", body = Page),
        (status = 307, description = "Redirect to sign-in"),
    ),
    tag = "pages",
)]
#[instrument(skip_all)]
pub async fn dashboard(
    session: RequestSession,
    Extension(routes): Extension<RouteTable>,
) -> Response {
    render(&session, &routes, "/dashboard", "Dashboard").await
}

#[utoipa::path(
    get,
    path = "/admin",
    responses (
        (status = 200, description = "Admin area", body = Page),
        (status = 307, description = "Redirect to sign-in"),
        (status = 403, description = "Session lacks the admin group", body = ErrorBody),
    ),
    tag = "pages",
)]
#[instrument(skip_all)]
pub async fn admin(session: RequestSession, Extension(routes): Extension<RouteTable>) -> Response {
    if session.is_authenticated().await && !session.has_role(ADMIN_GROUP).await {
        return (StatusCode::FORBIDDEN, Json(ErrorBody::new("Forbidden"))).into_response();
    }
    render(&session, &routes, "/admin", "Admin").await
}
