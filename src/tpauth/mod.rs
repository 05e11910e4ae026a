//! HTTP surface: the gatekeeper runs as middleware in front of every route and
//! handlers resolve the session per request.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;

use crate::auth::{
    gatekeeper::{gate, Gatekeeper},
    SessionResolver,
};

pub mod handlers;
pub mod openapi;

use handlers::{health, pages, session, user};

/// Build the application router.
#[must_use]
pub fn router(resolver: SessionResolver, gatekeeper: Gatekeeper) -> Router {
    let routes = gatekeeper.routes().clone();

    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/", get(pages::home))
        .route("/dashboard", get(pages::dashboard))
        .route("/admin", get(pages::admin))
        .route("/health", get(health::health).options(health::health))
        .route("/api/auth/session", get(session::session))
        .route(
            "/api/protected/user",
            get(user::get_user).post(user::update_user),
        )
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(openapi::openapi()) }),
        )
        .layer(middleware::from_fn_with_state(Arc::new(gatekeeper), gate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(resolver))
                .layer(Extension(routes)),
        )
}

/// Serve the router on `[::]:port` until ctrl-c.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(port: u16, resolver: SessionResolver, gatekeeper: Gatekeeper) -> Result<()> {
    let app = router(resolver, gatekeeper);

    let listener = TcpListener::bind(format!("[::]:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
