//! Server session resolver.
//!
//! Handlers ask a [`RequestSession`] for the authoritative user of the current
//! request. Resolution happens at most once per request and never errors: any
//! failure along the way (missing cookie, expired token, provider refusal)
//! reads as "no user".

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::claims::TokenClaims;
use super::provider::{cognito::CognitoApi, ProviderError};
use super::session::{extract_bearer_token, CookieJar, SessionPayload, SESSION_COOKIE_NAME};
use super::user::{CurrentUser, User, UserAttributes};

const DEMO_USER_ID: &str = "demo-user";

/// What the server knows about the caller: cookies and bearer token.
#[derive(Clone, Debug, Default)]
pub struct ServerContext {
    cookies: CookieJar,
    bearer: Option<String>,
}

impl ServerContext {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            cookies: CookieJar::from_headers(headers),
            bearer: extract_bearer_token(headers),
        }
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

/// The resolver's view of a session: the user and its group claims.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerUser {
    pub user: User,
    pub groups: Vec<String>,
}

/// Server-side identity backend.
#[async_trait]
pub trait ServerIdentity: Send + Sync {
    async fn current_user(&self, ctx: &ServerContext) -> Result<CurrentUser, ProviderError>;

    async fn user_attributes(&self, ctx: &ServerContext) -> Result<UserAttributes, ProviderError>;

    async fn groups(&self, ctx: &ServerContext) -> Result<Vec<String>, ProviderError>;
}

/// Verifies the caller's Cognito access token with `GetUser`.
pub struct CognitoServerIdentity {
    api: CognitoApi,
}

impl CognitoServerIdentity {
    #[must_use]
    pub fn new(api: CognitoApi) -> Self {
        Self { api }
    }

    fn access_token<'a>(&self, ctx: &'a ServerContext) -> Result<&'a str, ProviderError> {
        ctx.cookies
            .cognito_access_token(self.api.config().client_id())
            .or(ctx.bearer())
            .ok_or(ProviderError::NotAuthenticated)
    }

    fn live_claims(&self, ctx: &ServerContext) -> Result<(TokenClaims, String), ProviderError> {
        let token = self.access_token(ctx)?;
        let claims = TokenClaims::decode(token).map_err(|_| ProviderError::NotAuthenticated)?;
        if claims.is_expired(self.api.config().clock_skew_seconds()) {
            return Err(ProviderError::NotAuthenticated);
        }
        Ok((claims, token.to_string()))
    }
}

#[async_trait]
impl ServerIdentity for CognitoServerIdentity {
    async fn current_user(&self, ctx: &ServerContext) -> Result<CurrentUser, ProviderError> {
        let (claims, _) = self.live_claims(ctx)?;
        Ok(CurrentUser {
            username: claims.username().to_string(),
            user_id: claims.sub,
        })
    }

    async fn user_attributes(&self, ctx: &ServerContext) -> Result<UserAttributes, ProviderError> {
        let (_, token) = self.live_claims(ctx)?;
        Ok(self.api.get_user(&token).await?.attributes)
    }

    async fn groups(&self, ctx: &ServerContext) -> Result<Vec<String>, ProviderError> {
        Ok(self.live_claims(ctx)?.0.groups)
    }
}

/// Reads the identity straight out of a URL-encoded JSON session cookie.
/// Nothing is verified; only suitable for deployments that trust the cookie.
pub struct CookiePayloadIdentity {
    cookie_name: String,
}

impl Default for CookiePayloadIdentity {
    fn default() -> Self {
        Self {
            cookie_name: SESSION_COOKIE_NAME.to_string(),
        }
    }
}

impl CookiePayloadIdentity {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }

    fn payload(&self, ctx: &ServerContext) -> Result<SessionPayload, ProviderError> {
        ctx.cookies
            .non_empty(&self.cookie_name)
            .and_then(SessionPayload::decode)
            .ok_or(ProviderError::NotAuthenticated)
    }
}

#[async_trait]
impl ServerIdentity for CookiePayloadIdentity {
    async fn current_user(&self, ctx: &ServerContext) -> Result<CurrentUser, ProviderError> {
        let payload = self.payload(ctx)?;
        let user_id = payload
            .user_id
            .filter(|id| !id.is_empty())
            .or_else(|| payload.email.clone().filter(|email| !email.is_empty()))
            .unwrap_or_else(|| DEMO_USER_ID.to_string());
        Ok(CurrentUser {
            username: payload.email.unwrap_or_else(|| user_id.clone()),
            user_id,
        })
    }

    async fn user_attributes(&self, ctx: &ServerContext) -> Result<UserAttributes, ProviderError> {
        let payload = self.payload(ctx)?;
        let mut attributes = UserAttributes::new();
        if let Some(email) = payload.email {
            attributes.insert("email".to_string(), email);
        }
        if let Some(name) = payload.name {
            attributes.insert("name".to_string(), name);
        }
        Ok(attributes)
    }

    async fn groups(&self, ctx: &ServerContext) -> Result<Vec<String>, ProviderError> {
        Ok(self.payload(ctx)?.groups)
    }
}

/// Shared entry point; cheap to clone into request extensions.
#[derive(Clone)]
pub struct SessionResolver {
    identity: Arc<dyn ServerIdentity>,
}

impl SessionResolver {
    #[must_use]
    pub fn new(identity: Arc<dyn ServerIdentity>) -> Self {
        Self { identity }
    }

    #[must_use]
    pub fn cognito(api: CognitoApi) -> Self {
        Self::new(Arc::new(CognitoServerIdentity::new(api)))
    }

    #[must_use]
    pub fn cookie_payload(cookie_name: impl Into<String>) -> Self {
        Self::new(Arc::new(CookiePayloadIdentity::new(cookie_name)))
    }

    #[must_use]
    pub fn for_request(&self, headers: &HeaderMap) -> RequestSession {
        RequestSession {
            ctx: ServerContext::from_headers(headers),
            identity: Arc::clone(&self.identity),
            resolved: OnceCell::new(),
        }
    }
}

/// Session of a single request, resolved lazily and at most once.
pub struct RequestSession {
    ctx: ServerContext,
    identity: Arc<dyn ServerIdentity>,
    resolved: OnceCell<Option<ServerUser>>,
}

impl RequestSession {
    pub async fn get_server_user(&self) -> Option<ServerUser> {
        self.resolved.get_or_init(|| self.resolve()).await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.get_server_user().await.is_some()
    }

    /// Whether the session's group claims contain `role`.
    pub async fn has_role(&self, role: &str) -> bool {
        self.get_server_user()
            .await
            .is_some_and(|user| user.groups.iter().any(|group| group == role))
    }

    async fn resolve(&self) -> Option<ServerUser> {
        let result = async {
            let current = self.identity.current_user(&self.ctx).await?;
            let attributes = self.identity.user_attributes(&self.ctx).await?;
            let groups = self.identity.groups(&self.ctx).await?;
            Ok::<_, ProviderError>(ServerUser {
                user: User::from_provider(&current, attributes),
                groups,
            })
        }
        .await;

        match result {
            Ok(user) => Some(user),
            Err(err) => {
                debug!("no server session: {err}");
                None
            }
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resolver = parts.extensions.get::<SessionResolver>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session resolver not configured",
        ))?;
        Ok(resolver.for_request(&parts.headers))
    }
}
