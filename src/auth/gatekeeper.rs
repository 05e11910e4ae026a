//! Edge gatekeeper.
//!
//! Decides per request whether to let it through or bounce it to the sign-in
//! page. It only looks at cookie *presence*: tokens are never parsed or
//! verified here, so passing the gate does not mean the session is valid.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::routes::RouteTable;
use super::session::{CookieJar, SESSION_COOKIE_NAME};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GateDecision {
    Allow,
    /// Send the client to this location instead.
    Redirect(String),
}

#[derive(Clone, Debug)]
pub struct Gatekeeper {
    routes: RouteTable,
    cookie_name: String,
    accept_provider_cookies: bool,
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self {
            routes: RouteTable::default(),
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            accept_provider_cookies: true,
        }
    }
}

impl Gatekeeper {
    #[must_use]
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Also accept a Cognito `*.accessToken` cookie as a session.
    #[must_use]
    pub fn with_provider_cookies(mut self, accept: bool) -> Self {
        self.accept_provider_cookies = accept;
        self
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    fn has_session(&self, cookies: &CookieJar) -> bool {
        cookies.non_empty(&self.cookie_name).is_some()
            || (self.accept_provider_cookies && cookies.any_cognito_access_token().is_some())
    }

    #[must_use]
    pub fn decide(&self, path: &str, cookies: &CookieJar) -> GateDecision {
        let class = self.routes.classify(path);
        if !class.requires_session() || self.has_session(cookies) {
            return GateDecision::Allow;
        }
        GateDecision::Redirect(self.routes.sign_in_redirect(path))
    }
}

/// Axum middleware applying [`Gatekeeper::decide`]; redirects answer `307`.
pub async fn gate(
    State(gatekeeper): State<Arc<Gatekeeper>>,
    request: Request,
    next: Next,
) -> Response {
    let cookies = CookieJar::from_headers(request.headers());
    match gatekeeper.decide(request.uri().path(), &cookies) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect(location) => {
            debug!(path = request.uri().path(), "no session cookie, redirecting");
            Redirect::temporary(&location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

    fn jar(cookie: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn protected_without_cookie_redirects() {
        let gate = Gatekeeper::default();
        assert_eq!(
            gate.decide("/dashboard/stats", &CookieJar::default()),
            GateDecision::Redirect("/authentication/sign-in?from=%2Fdashboard%2Fstats".to_string())
        );
        assert_eq!(
            gate.decide("/", &CookieJar::default()),
            GateDecision::Redirect("/authentication/sign-in?from=%2F".to_string())
        );
    }

    #[test]
    fn empty_cookie_value_is_no_session() {
        let gate = Gatekeeper::default();
        assert!(matches!(
            gate.decide("/admin", &jar("tp_session=")),
            GateDecision::Redirect(_)
        ));
        assert_eq!(gate.decide("/admin", &jar("tp_session=abc")), GateDecision::Allow);
    }

    #[test]
    fn public_and_unclassified_pass() {
        let gate = Gatekeeper::default();
        for path in ["/authentication/sign-in", "/_next/static/app.js", "/health", "/about"] {
            assert_eq!(gate.decide(path, &CookieJar::default()), GateDecision::Allow, "{path}");
        }
    }

    #[test]
    fn provider_cookie_is_optional() {
        let cookie = "CognitoIdentityServiceProvider.client.alice.accessToken=eyJ";
        assert_eq!(
            Gatekeeper::default().decide("/settings", &jar(cookie)),
            GateDecision::Allow
        );
        let strict = Gatekeeper::default().with_provider_cookies(false);
        assert!(matches!(
            strict.decide("/settings", &jar(cookie)),
            GateDecision::Redirect(_)
        ));
    }

    #[test]
    fn custom_cookie_name() {
        let gate = Gatekeeper::default().with_cookie_name("sid");
        assert_eq!(gate.decide("/profile", &jar("sid=1")), GateDecision::Allow);
        assert!(matches!(
            gate.decide("/profile", &jar("tp_session=1")),
            GateDecision::Redirect(_)
        ));
    }
}
