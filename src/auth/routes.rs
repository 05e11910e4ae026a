//! Route classification shared by the gatekeeper and the client orchestrator.

use url::form_urlencoded;

/// Sign-in page every unauthenticated redirect points at.
pub const SIGN_IN_PATH: &str = "/authentication/sign-in";
/// Landing page after a successful sign-in.
pub const HOME_PATH: &str = "/";
/// Query parameter carrying the originally requested path.
pub const RETURN_PARAM: &str = "from";

const PUBLIC_PREFIXES: &[&str] = &[
    "/authentication/sign-in",
    "/authentication/sign-up",
    "/authentication/forgot-password",
    "/authentication/reset-password",
    "/authentication/confirm-email",
    "/authentication/lock-screen",
    "/authentication/logout",
    "/_next",
    "/favicon.ico",
    "/images",
    "/api/auth",
    "/health",
];

const PROTECTED_PREFIXES: &[&str] = &[
    "/dashboard",
    "/admin",
    "/profile",
    "/apps",
    "/projects",
    "/settings",
];

/// How a request path is treated by the auth layers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteClass {
    /// Always reachable, regardless of session state.
    Public,
    /// Requires a session.
    Protected,
    /// The root path, which requires a session as well.
    Root,
    /// Not listed anywhere; the edge lets it through.
    Unclassified,
}

impl RouteClass {
    #[must_use]
    pub fn requires_session(self) -> bool {
        matches!(self, Self::Protected | Self::Root)
    }
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    public_prefixes: Vec<String>,
    protected_prefixes: Vec<String>,
    sign_in_path: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            public_prefixes: PUBLIC_PREFIXES.iter().map(ToString::to_string).collect(),
            protected_prefixes: PROTECTED_PREFIXES.iter().map(ToString::to_string).collect(),
            sign_in_path: SIGN_IN_PATH.to_string(),
        }
    }
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.public_prefixes.push(prefix.into());
        self
    }

    #[must_use]
    pub fn with_protected_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.protected_prefixes.push(prefix.into());
        self
    }

    #[must_use]
    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    #[must_use]
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    /// Classify a request path. Public prefixes win over protected ones.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if self
            .public_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return RouteClass::Public;
        }
        if self
            .protected_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return RouteClass::Protected;
        }
        if path == "/" {
            return RouteClass::Root;
        }
        RouteClass::Unclassified
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path) == RouteClass::Public
    }

    /// Sign-in location carrying `from=<path>` so the page can send the user back.
    #[must_use]
    pub fn sign_in_redirect(&self, from: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(RETURN_PARAM, from)
            .finish();
        format!("{}?{query}", self.sign_in_path)
    }
}
