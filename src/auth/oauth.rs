//! OAuth 2.0 client for the Google authorization and token endpoints

use super::bundle::{REQUIRED_SCOPE, TokenSet, now_millis};
use crate::error::{AuthError, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Redirect URI registered on the OAuth client
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// OAuth endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Redirect URI for the OAuth callback
    pub redirect_uri: String,
    /// Scope to request
    pub scope: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: REQUIRED_SCOPE.to_string(),
        }
    }
}

impl OAuthConfig {
    /// Default endpoints with a different token URL
    #[must_use]
    pub fn with_token_url(token_url: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            ..Self::default()
        }
    }
}

/// Raw token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "super::bundle::deserialize_scope")]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TokenResponse {
    fn into_token_set(self, now_ms: u64) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: self
                .expires_in
                .map(|secs| now_ms.saturating_add(secs.saturating_mul(1000))),
            extra: self.extra,
        }
    }
}

/// Error response from token endpoint
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// PKCE code challenge data
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    verifier: String,
    challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh verifier and its S256 challenge
    #[must_use]
    pub fn generate() -> Self {
        let entropy: [u8; 32] = rand::random();
        Self::from_verifier(URL_SAFE_NO_PAD.encode(entropy))
    }

    /// Derive the challenge for a known verifier
    #[must_use]
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }

    /// Code verifier sent with the token exchange
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Code challenge sent with the authorization request
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

/// OAuth client bound to one registered application
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    config: OAuthConfig,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Create a client for the given application credentials
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        config: OAuthConfig,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Registered client id
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Endpoint configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// HTTP client shared with authorized API calls
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Authorization URL requesting offline access with forced consent, so
    /// that a refresh token is issued on every run.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configured authorization URL is not a URL.
    pub fn authorization_url(&self, pkce: Option<&PkceChallenge>) -> Result<String> {
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", self.config.scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ];
        if let Some(pkce) = pkce {
            params.push(("code_challenge", pkce.challenge()));
            params.push(("code_challenge_method", "S256"));
        }

        let url = Url::parse_with_params(&self.config.auth_url, &params).map_err(|e| {
            AuthError::invalid_config(format!("auth url {}: {e}", self.config.auth_url))
        })?;
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    ///
    /// Returns `TokenExchangeFailed` carrying the provider's message when the
    /// code is rejected or the endpoint cannot be reached.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        tracing::debug!(token_url = %self.config.token_url, "Exchanging authorization code");
        self.post_token(&form).await.map_err(AuthError::token_exchange)
    }

    /// Mint a new access token from a refresh token
    ///
    /// # Errors
    ///
    /// Returns `RefreshFailed` if the provider rejects the grant.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        tracing::debug!(token_url = %self.config.token_url, "Refreshing access token");
        self.post_token(&form).await.map_err(AuthError::refresh)
    }

    /// POST a form to the token endpoint; errors are flattened to the
    /// message shown to the operator.
    async fn post_token(&self, form: &[(&str, &str)]) -> std::result::Result<TokenSet, String> {
        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| e.to_string())?;

        if let Ok(error) = serde_json::from_str::<ErrorResponse>(&response_text) {
            return Err(error.error_description.unwrap_or(error.error));
        }
        if !status.is_success() {
            return Err(format!("token endpoint returned {status}: {response_text}"));
        }

        let token_response: TokenResponse = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse token response: {e}"))?;

        Ok(token_response.into_token_set(now_millis()))
    }
}
