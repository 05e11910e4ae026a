//! Cognito user-pool client speaking the Identity Provider JSON protocol.
//!
//! Flow Overview: [`CognitoApi`] is the stateless HTTP layer (one method per
//! `X-Amz-Target` operation) and is shared with the server-side resolver.
//! [`CognitoClient`] wraps it with the browser-side session: tokens are held
//! in memory, renewed with the refresh token when the access token expires,
//! and every session change is published as an [`AuthEvent`].
//!
//! Security boundaries: passwords and tokens are never logged; token claims are
//! read without signature verification and only after Cognito issued them.

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::{
    Credentials, EventHub, IdentityProvider, ProviderError, SignInStep, SignUpStep, SocialProvider,
};
use crate::auth::claims::TokenClaims;
use crate::auth::events::AuthEvent;
use crate::auth::user::{CurrentUser, UserAttributes};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_CLOCK_SKEW_SECONDS: u64 = 30;
const OAUTH_SCOPES: &str = "openid email profile";

#[derive(Clone, Debug)]
pub struct CognitoConfig {
    region: String,
    client_id: String,
    endpoint: Option<String>,
    hosted_ui_domain: Option<String>,
    redirect_sign_in: Option<String>,
    timeout: Duration,
    clock_skew_seconds: u64,
}

impl CognitoConfig {
    #[must_use]
    pub fn new(region: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            client_id: client_id.into(),
            endpoint: None,
            hosted_ui_domain: None,
            redirect_sign_in: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
        }
    }

    /// Override the regional endpoint (local emulators, tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Hosted UI domain used for redirect-based social sign-in.
    #[must_use]
    pub fn with_hosted_ui_domain(mut self, domain: impl Into<String>) -> Self {
        self.hosted_ui_domain = Some(domain.into());
        self
    }

    /// Callback URL registered for the hosted UI.
    #[must_use]
    pub fn with_redirect_sign_in(mut self, redirect: impl Into<String>) -> Self {
        self.redirect_sign_in = Some(redirect.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_clock_skew_seconds(mut self, seconds: u64) -> Self {
        self.clock_skew_seconds = seconds;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn clock_skew_seconds(&self) -> u64 {
        self.clock_skew_seconds
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }

    fn hosted_ui_base(&self) -> Option<String> {
        let domain = self.hosted_ui_domain.as_deref()?.trim_end_matches('/');
        Some(
            if domain.starts_with("http://") || domain.starts_with("https://") {
                domain.to_string()
            } else {
                format!("https://{domain}")
            },
        )
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeType {
    name: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: HashMap<&'a str, &'a str>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthResponse {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
    user_attributes: Vec<AttributeType>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    #[serde(default)]
    user_confirmed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmSignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    confirmation_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    username: String,
    #[serde(default)]
    user_attributes: Vec<AttributeType>,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Default, Deserialize)]
struct ServiceError {
    #[serde(default, rename = "__type")]
    kind: String,
    #[serde(default, alias = "Message")]
    message: String,
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Profile returned by `GetUser`.
pub struct CognitoProfile {
    pub username: String,
    pub attributes: UserAttributes,
}

/// Stateless Cognito Identity Provider API.
#[derive(Clone, Debug)]
pub struct CognitoApi {
    http: Client,
    config: CognitoConfig,
}

impl CognitoApi {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CognitoConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &CognitoConfig {
        &self.config
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| ProviderError::Unknown(format!("Request error: {err}")))?;
        let response = self
            .http
            .post(self.config.endpoint())
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header(CONTENT_TYPE, AMZ_JSON)
            .body(payload)
            .send()
            .await
            .map_err(|err| {
                error!(operation, "Cognito request failed: {err}");
                ProviderError::Unknown(format!("Network error: {err}"))
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ProviderError::Unknown(format!("Network error: {err}")))?;

        if status.is_success() {
            return serde_json::from_slice(&bytes)
                .map_err(|err| ProviderError::Unknown(format!("Response error: {err}")));
        }

        let service_error: ServiceError = serde_json::from_slice(&bytes).unwrap_or_default();
        debug!(operation, %status, kind = %service_error.kind, "Cognito returned an error");
        if service_error.kind.is_empty() {
            return Err(ProviderError::Unknown(format!(
                "Request failed ({status})"
            )));
        }
        Err(ProviderError::from_exception(
            &service_error.kind,
            &service_error.message,
        ))
    }

    /// `InitiateAuth` with `USER_PASSWORD_AUTH`.
    ///
    /// # Errors
    /// Returns the mapped Cognito exception.
    pub async fn password_auth(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<InitiateAuthResponse, ProviderError> {
        let mut parameters = HashMap::new();
        parameters.insert("USERNAME", username);
        parameters.insert("PASSWORD", password.expose_secret());
        self.call(
            "InitiateAuth",
            &InitiateAuthRequest {
                auth_flow: "USER_PASSWORD_AUTH",
                client_id: &self.config.client_id,
                auth_parameters: parameters,
            },
        )
        .await
    }

    /// `InitiateAuth` with `REFRESH_TOKEN_AUTH`.
    ///
    /// # Errors
    /// Returns the mapped Cognito exception.
    pub async fn refresh_auth(
        &self,
        refresh_token: &SecretString,
    ) -> Result<InitiateAuthResponse, ProviderError> {
        let mut parameters = HashMap::new();
        parameters.insert("REFRESH_TOKEN", refresh_token.expose_secret());
        self.call(
            "InitiateAuth",
            &InitiateAuthRequest {
                auth_flow: "REFRESH_TOKEN_AUTH",
                client_id: &self.config.client_id,
                auth_parameters: parameters,
            },
        )
        .await
    }

    /// `SignUp`; returns whether the user pool confirmed the account already.
    ///
    /// # Errors
    /// Returns the mapped Cognito exception.
    pub async fn sign_up(&self, email: &str, password: &SecretString) -> Result<bool, ProviderError> {
        let response: SignUpResponse = self
            .call(
                "SignUp",
                &SignUpRequest {
                    client_id: &self.config.client_id,
                    username: email,
                    password: password.expose_secret(),
                    user_attributes: vec![AttributeType {
                        name: "email".to_string(),
                        value: email.to_string(),
                    }],
                },
            )
            .await?;
        Ok(response.user_confirmed)
    }

    /// # Errors
    /// Returns the mapped Cognito exception.
    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), ProviderError> {
        let _: Empty = self
            .call(
                "ConfirmSignUp",
                &ConfirmSignUpRequest {
                    client_id: &self.config.client_id,
                    username: email,
                    confirmation_code: code,
                },
            )
            .await?;
        Ok(())
    }

    /// `GetUser` for the holder of `access_token`.
    ///
    /// # Errors
    /// Returns `NotAuthenticated` when Cognito rejects the token.
    pub async fn get_user(&self, access_token: &str) -> Result<CognitoProfile, ProviderError> {
        let response: GetUserResponse = self
            .call("GetUser", &AccessTokenRequest { access_token })
            .await
            .map_err(|err| match err {
                ProviderError::InvalidCredentials => ProviderError::NotAuthenticated,
                other => other,
            })?;
        Ok(CognitoProfile {
            username: response.username,
            attributes: response
                .user_attributes
                .into_iter()
                .map(|attribute| (attribute.name, attribute.value))
                .collect(),
        })
    }

    /// # Errors
    /// Returns the mapped Cognito exception.
    pub async fn global_sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let _: Empty = self
            .call("GlobalSignOut", &AccessTokenRequest { access_token })
            .await?;
        Ok(())
    }

    /// Hosted-UI authorize URL for a federated provider.
    ///
    /// # Errors
    /// Returns `Unknown` when no hosted UI domain or callback URL is configured.
    pub fn authorize_url(&self, social: SocialProvider) -> Result<String, ProviderError> {
        let (Some(base), Some(redirect)) = (
            self.config.hosted_ui_base(),
            self.config.redirect_sign_in.as_deref(),
        ) else {
            return Err(ProviderError::Unknown(
                "Social sign in is not configured.".to_string(),
            ));
        };
        let url = Url::parse_with_params(
            &format!("{base}/oauth2/authorize"),
            &[
                ("identity_provider", social.identity_provider_name()),
                ("redirect_uri", redirect),
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("scope", OAUTH_SCOPES),
            ],
        )
        .map_err(|err| ProviderError::Unknown(format!("Invalid hosted UI domain: {err}")))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthTokenResponse, ProviderError> {
        let (Some(base), Some(redirect)) = (
            self.config.hosted_ui_base(),
            self.config.redirect_sign_in.as_deref(),
        ) else {
            return Err(ProviderError::Unknown(
                "Social sign in is not configured.".to_string(),
            ));
        };
        let response = self
            .http
            .post(format!("{base}/oauth2/token"))
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code),
                ("redirect_uri", redirect),
            ])
            .send()
            .await
            .map_err(|err| ProviderError::Unknown(format!("Network error: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unknown(format!(
                "Token exchange failed ({status})"
            )));
        }
        response
            .json()
            .await
            .map_err(|err| ProviderError::Unknown(format!("Response error: {err}")))
    }
}

/// Map a Cognito challenge to the step identifier surfaced to the user.
#[must_use]
pub fn challenge_step(challenge: &str) -> String {
    match challenge {
        "SMS_MFA" => "CONFIRM_SIGN_IN_WITH_SMS_CODE",
        "SOFTWARE_TOKEN_MFA" => "CONFIRM_SIGN_IN_WITH_TOTP_CODE",
        "NEW_PASSWORD_REQUIRED" => "CONFIRM_SIGN_IN_WITH_NEW_PASSWORD_REQUIRED",
        "MFA_SETUP" => "CONTINUE_SIGN_IN_WITH_TOTP_SETUP",
        "SELECT_MFA_TYPE" => "CONTINUE_SIGN_IN_WITH_MFA_SELECTION",
        "CUSTOM_CHALLENGE" => "CONFIRM_SIGN_IN_WITH_CUSTOM_CHALLENGE",
        other => other,
    }
    .to_string()
}

struct TokenSet {
    access_token: SecretString,
    id_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
}

impl TokenSet {
    fn identity_claims(&self) -> Result<TokenClaims, ProviderError> {
        let token = self
            .id_token
            .as_ref()
            .unwrap_or(&self.access_token)
            .expose_secret();
        TokenClaims::decode(token).map_err(|err| ProviderError::Unknown(format!("Invalid token: {err}")))
    }
}

/// Browser-side Cognito session.
pub struct CognitoClient {
    api: CognitoApi,
    tokens: RwLock<Option<TokenSet>>,
    events: EventHub,
}

impl CognitoClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CognitoConfig) -> anyhow::Result<Self> {
        Ok(Self {
            api: CognitoApi::new(config)?,
            tokens: RwLock::new(None),
            events: EventHub::new(),
        })
    }

    #[must_use]
    pub fn api(&self) -> &CognitoApi {
        &self.api
    }

    fn store(&self, result: AuthenticationResult, previous_refresh: Option<SecretString>) -> TokenSet {
        TokenSet {
            access_token: SecretString::from(result.access_token),
            id_token: result.id_token.map(SecretString::from),
            refresh_token: result
                .refresh_token
                .map(SecretString::from)
                .or(previous_refresh),
        }
    }

    /// Claims of the current session, refreshing an expired access token first.
    async fn session_claims(&self) -> Result<(TokenClaims, SecretString), ProviderError> {
        let leeway = self.api.config().clock_skew_seconds();
        let refresh_token = {
            let guard = self.tokens.read().await;
            let tokens = guard.as_ref().ok_or(ProviderError::NotAuthenticated)?;
            let access = TokenClaims::decode(tokens.access_token.expose_secret())
                .map_err(|err| ProviderError::Unknown(format!("Invalid token: {err}")))?;
            if !access.is_expired(leeway) {
                return Ok((tokens.identity_claims()?, tokens.access_token.clone()));
            }
            tokens.refresh_token.clone()
        };

        let Some(refresh_token) = refresh_token else {
            *self.tokens.write().await = None;
            self.events.publish(AuthEvent::TokenRefreshFailed);
            return Err(ProviderError::NotAuthenticated);
        };

        match self.api.refresh_auth(&refresh_token).await {
            Ok(InitiateAuthResponse {
                authentication_result: Some(result),
                ..
            }) => {
                let tokens = self.store(result, Some(refresh_token));
                let claims = tokens.identity_claims()?;
                let access = tokens.access_token.clone();
                *self.tokens.write().await = Some(tokens);
                info!("access token refreshed");
                self.events.publish(AuthEvent::TokenRefreshed);
                Ok((claims, access))
            }
            _ => {
                *self.tokens.write().await = None;
                warn!("access token refresh failed");
                self.events.publish(AuthEvent::TokenRefreshFailed);
                Err(ProviderError::NotAuthenticated)
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<SignInStep, ProviderError> {
        if self.tokens.read().await.is_some() {
            return Err(ProviderError::AlreadyAuthenticated);
        }

        let response = match self
            .api
            .password_auth(&credentials.email, &credentials.password)
            .await
        {
            Ok(response) => response,
            Err(ProviderError::UserNotConfirmed) => return Ok(SignInStep::ConfirmSignUp),
            Err(err) => return Err(err),
        };

        if let Some(result) = response.authentication_result {
            *self.tokens.write().await = Some(self.store(result, None));
            self.events.publish(AuthEvent::SignedIn);
            return Ok(SignInStep::Done);
        }
        if let Some(challenge) = response.challenge_name {
            debug!(challenge = %challenge, "sign-in challenge issued");
            return Ok(SignInStep::Additional(challenge_step(&challenge)));
        }
        Err(ProviderError::SessionInterrupted)
    }

    async fn sign_in_with_redirect(&self, social: SocialProvider) -> Result<String, ProviderError> {
        self.api.authorize_url(social)
    }

    #[instrument(skip(self, code))]
    async fn complete_redirect_sign_in(&self, code: &str) -> Result<(), ProviderError> {
        match self.api.exchange_code(code).await {
            Ok(response) => {
                *self.tokens.write().await = Some(TokenSet {
                    access_token: SecretString::from(response.access_token),
                    id_token: response.id_token.map(SecretString::from),
                    refresh_token: response.refresh_token.map(SecretString::from),
                });
                self.events.publish(AuthEvent::RedirectSignInCompleted);
                Ok(())
            }
            Err(err) => {
                warn!("hosted UI code exchange failed: {err}");
                self.events.publish(AuthEvent::RedirectSignInFailed);
                Err(err)
            }
        }
    }

    #[instrument(skip(self, password))]
    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SignUpStep, ProviderError> {
        Ok(if self.api.sign_up(email, password).await? {
            SignUpStep::Done
        } else {
            SignUpStep::ConfirmSignUp
        })
    }

    #[instrument(skip(self, code))]
    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<SignUpStep, ProviderError> {
        self.api.confirm_sign_up(email, code).await?;
        Ok(SignUpStep::Done)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let tokens = self.tokens.write().await.take();
        let result = match tokens {
            Some(tokens) => self
                .api
                .global_sign_out(tokens.access_token.expose_secret())
                .await
                .inspect_err(|err| warn!("GlobalSignOut failed: {err}")),
            None => Ok(()),
        };
        // Local tokens are gone either way.
        self.events.publish(AuthEvent::SignedOut);
        result
    }

    async fn get_current_user(&self) -> Result<CurrentUser, ProviderError> {
        let (claims, _) = self.session_claims().await?;
        Ok(CurrentUser {
            username: claims.username().to_string(),
            user_id: claims.sub,
        })
    }

    async fn fetch_user_attributes(&self) -> Result<UserAttributes, ProviderError> {
        let (_, access_token) = self.session_claims().await?;
        let profile = self.api.get_user(access_token.expose_secret()).await?;
        Ok(profile.attributes)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
