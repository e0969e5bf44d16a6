//! Identity provider: OAuth authorization-code flow and login lookup.
//!
//! ```text
//! IdentityProvider (trait)
//!     |
//!     +-- GitHubProvider   authorize / exchange code / GET /user
//!     |
//!     +-- test doubles in the daemon's router tests
//! ```
//!
//! [`current_login`] wraps [`IdentityProvider::fetch_login`] in the bounded
//! retry combinator so that the attempt limit is explicit and testable.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use ureq::Agent;
use url::Url;

use crate::errors::ErrorCode;
use crate::retry::{RetryPolicy, RetryableError, run_with_retry};

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_API_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("handin/", env!("CARGO_PKG_VERSION"));

/// Number of `GET /user` attempts before the session is abandoned.
pub const DEFAULT_LOGIN_ATTEMPTS: u32 = 3;

/// OAuth access token held in a session.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Errors from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("identity provider denied the login: {0}")]
    Denied(String),

    #[error("unexpected identity provider response: {0}")]
    Decode(String),

    #[error("login state does not match the pending login")]
    StateMismatch,

    #[error("identity provider did not confirm the user after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl IdentityError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::StateMismatch => ErrorCode::OAuthStateMismatch,
            Self::Exhausted { .. } => ErrorCode::LoginFetchExhausted,
            Self::Transport(_) | Self::Status { .. } | Self::Denied(_) | Self::Decode(_) => {
                ErrorCode::OAuthExchangeFailed
            }
        }
    }
}

impl RetryableError for IdentityError {
    /// Any non-ok answer is worth another try.
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. } | Self::Decode(_))
    }
}

/// An OAuth identity provider.
///
/// Calls block on network I/O.
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start a login.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange the callback's authorization code for an access token.
    fn exchange_code(&self, code: &str) -> Result<AccessToken, IdentityError>;

    /// The stable login handle of the token's owner.
    fn fetch_login(&self, token: &AccessToken) -> Result<String, IdentityError>;

    /// Public OAuth client id, shown on the home page.
    fn client_id(&self) -> &str;
}

/// OAuth client credentials for one profile.
#[derive(Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Absolute callback URL; when `None` the provider uses the URL
    /// registered for the app.
    pub redirect_uri: Option<String>,
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

/// GitHub OAuth app with an empty scope: only public profile access.
pub struct GitHubProvider {
    client: OAuthClient,
    agent: Agent,
    api_base_url: String,
}

impl GitHubProvider {
    pub fn new(client: OAuthClient) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            client,
            agent,
            api_base_url: GITHUB_API_BASE_URL.to_string(),
        }
    }

    fn parse_exchange(body: &str) -> Result<AccessToken, IdentityError> {
        let payload: TokenExchangeResponse =
            serde_json::from_str(body).map_err(|e| IdentityError::Decode(e.to_string()))?;
        if let Some(error) = payload.error {
            let detail = payload.error_description.unwrap_or_default();
            return Err(IdentityError::Denied(format!("{error}: {detail}")));
        }
        match payload.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => Err(IdentityError::Decode("missing access_token".to_string())),
        }
    }

    fn parse_user(body: &str) -> Result<String, IdentityError> {
        let user: UserResponse =
            serde_json::from_str(body).map_err(|e| IdentityError::Decode(e.to_string()))?;
        if user.login.is_empty() {
            return Err(IdentityError::Decode("empty login".to_string()));
        }
        Ok(user.login)
    }
}

fn read_ok_body(response: &mut ureq::http::Response<ureq::Body>) -> Result<String, IdentityError> {
    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(IdentityError::Status { status });
    }
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| IdentityError::Transport(e.to_string()))
}

impl IdentityProvider for GitHubProvider {
    fn authorize_url(&self, state: &str) -> String {
        let mut params = vec![("client_id", self.client.client_id.as_str()), ("state", state)];
        if let Some(redirect) = &self.client.redirect_uri {
            params.push(("redirect_uri", redirect.as_str()));
        }
        match Url::parse_with_params(GITHUB_AUTHORIZE_URL, &params) {
            Ok(url) => url.into(),
            Err(_) => GITHUB_AUTHORIZE_URL.to_string(),
        }
    }

    fn exchange_code(&self, code: &str) -> Result<AccessToken, IdentityError> {
        let mut form = vec![
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.expose_secret()),
            ("code", code),
        ];
        if let Some(redirect) = &self.client.redirect_uri {
            form.push(("redirect_uri", redirect.as_str()));
        }

        let mut response = self
            .agent
            .post(GITHUB_TOKEN_URL)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send_form(form)
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        let body = read_ok_body(&mut response)?;
        Self::parse_exchange(&body)
    }

    fn fetch_login(&self, token: &AccessToken) -> Result<String, IdentityError> {
        let url = format!("{}/user", self.api_base_url.trim_end_matches('/'));
        let mut response = self
            .agent
            .get(url.as_str())
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("Authorization", format!("Bearer {}", token.expose()))
            .call()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        let body = read_ok_body(&mut response)?;
        Self::parse_user(&body)
    }

    fn client_id(&self) -> &str {
        &self.client.client_id
    }
}

/// Fetch the caller's login, retrying up to `policy.max_attempts` times.
///
/// Each attempt runs on a blocking thread. Once the attempts are used up
/// the error is [`IdentityError::Exhausted`]; non-retryable errors are
/// returned as they are.
pub async fn current_login(
    provider: Arc<dyn IdentityProvider>,
    token: AccessToken,
    policy: &RetryPolicy,
) -> Result<String, IdentityError> {
    let result = run_with_retry("fetch_login", policy, || {
        let provider = Arc::clone(&provider);
        let token = token.clone();
        async move {
            tokio::task::spawn_blocking(move || provider.fetch_login(&token))
                .await
                .map_err(|e| IdentityError::Transport(format!("login task failed: {e}")))?
        }
    })
    .await;

    result.map_err(|err| {
        if err.is_retryable() {
            IdentityError::Exhausted {
                attempts: policy.attempts(),
            }
        } else {
            err
        }
    })
}
