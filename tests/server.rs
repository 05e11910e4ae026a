use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION},
        Method, Request, StatusCode,
    },
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use tpauth::auth::gatekeeper::Gatekeeper;
use tpauth::auth::session::SessionPayload;
use tpauth::auth::{RouteTable, SessionResolver};
use tpauth::tpauth::router;

fn app() -> Router {
    router(
        SessionResolver::cookie_payload("tp_session"),
        Gatekeeper::new(RouteTable::default()),
    )
}

fn session_cookie(groups: &[&str]) -> String {
    let payload = SessionPayload {
        user_id: Some("user-42".to_string()),
        email: Some("alice@example.com".to_string()),
        name: Some("Alice".to_string()),
        groups: groups.iter().map(ToString::to_string).collect(),
    };
    format!("tp_session={}", payload.encode().unwrap())
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn protected_page_without_cookie_redirects_at_edge() {
    let response = app().oneshot(get("/dashboard/stats", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        Some("/authentication/sign-in?from=%2Fdashboard%2Fstats")
    );
}

#[tokio::test]
async fn root_without_cookie_redirects() {
    let response = app().oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/authentication/sign-in?from=%2F"));
}

#[tokio::test]
async fn dashboard_renders_server_user() {
    let cookie = session_cookie(&[]);
    let response = app()
        .oneshot(get("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["title"], "Dashboard");
    assert_eq!(body["greeting"], "Welcome, Alice!");
    assert_eq!(body["user"]["userId"], "user-42");
    assert_eq!(body["user"]["email"], "alice@example.com");
}

#[tokio::test]
async fn unreadable_cookie_passes_edge_but_server_redirects() {
    let response = app()
        .oneshot(get("/dashboard", Some("tp_session=not-json")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        Some("/authentication/sign-in?from=%2Fdashboard")
    );
}

#[tokio::test]
async fn admin_requires_admins_group() {
    let analyst = session_cookie(&["ANALYSTS"]);
    let response = app().oneshot(get("/admin", Some(&analyst))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await, json!({ "error": "Forbidden" }));

    let admin = session_cookie(&["ADMINS"]);
    let response = app().oneshot(get("/admin", Some(&admin))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["groups"], json!(["ADMINS"]));
}

#[tokio::test]
async fn health_is_public() {
    let response = app().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let x_app = response
        .headers()
        .get("X-App")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    assert!(x_app.is_some_and(|value| value.starts_with("tpauth:")));
    let body = json_body(response).await;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn request_id_is_generated_and_propagated() {
    let response = app().oneshot(get("/health", None)).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-1")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-1")
    );
}

#[tokio::test]
async fn session_endpoint() {
    let response = app().oneshot(get("/api/auth/session", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let cookie = session_cookie(&["ADMINS"]);
    let response = app()
        .oneshot(get("/api/auth/session", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "userId": "user-42",
            "email": "alice@example.com",
            "name": "Alice",
            "groups": ["ADMINS"],
        })
    );
}

#[tokio::test]
async fn protected_api_answers_401_without_session() {
    let response = app()
        .oneshot(get("/api/protected/user", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, json!({ "error": "Unauthorized" }));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/protected/user")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"Bob"}"#))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_api_returns_profile() {
    let cookie = session_cookie(&[]);
    let response = app()
        .oneshot(get("/api/protected/user", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "userId": "user-42", "email": "alice@example.com", "name": "Alice" })
    );
}

#[tokio::test]
async fn profile_update() {
    let cookie = session_cookie(&[]);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/protected/user")
        .header(COOKIE, &cookie)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"Alice B."}"#))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "success": true,
            "message": "Profile updated successfully",
            "userId": "user-42",
        })
    );

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/protected/user")
        .header(COOKIE, &cookie)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Invalid request body" })
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let response = app()
        .oneshot(get("/api-docs/openapi.json", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["info"]["title"], env!("CARGO_PKG_NAME"));
    assert!(body["paths"]["/api/protected/user"]["post"].is_object());
}
