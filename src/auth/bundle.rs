//! Credential bundle model and validation

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::utils::{redact, redact_opt};

/// The single permission every usable bundle must carry
pub const REQUIRED_SCOPE: &str = "https://www.googleapis.com/auth/photoslibrary.readonly";

/// Current wall-clock time in epoch milliseconds
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Millisecond clock used for expiry checks
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Clock backed by [`now_millis`]
#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(now_millis)
}

/// Accepts `scope` either as a delimited string or as a list of strings.
pub(crate) fn deserialize_scope<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScopeRepr {
        Text(String),
        List(Vec<String>),
    }

    Ok(
        Option::<ScopeRepr>::deserialize(deserializer)?.map(|repr| match repr {
            ScopeRepr::Text(text) => text,
            ScopeRepr::List(items) => items.join(" "),
        }),
    )
}

/// Split a scope string into individual permissions
fn split_scopes(scope: &str) -> impl Iterator<Item = &str> {
    scope
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
}

fn truthy(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Tokens returned by the provider, normalized to bundle terms
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    /// New access token
    pub access_token: String,

    /// Refresh token, only sent on the initial exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes
    #[serde(
        default,
        deserialize_with = "deserialize_scope",
        skip_serializing_if = "Option::is_none"
    )]
    pub scope: Option<String>,

    /// Token type, usually "Bearer"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Absolute expiry in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<u64>,

    /// Any further fields the provider returned (e.g. `id_token`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Application identity plus granted tokens, persisted as one JSON object
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialBundle {
    /// OAuth client id of the registered application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth client secret of the registered application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Short-lived bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Long-lived token used to mint access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes, space delimited
    #[serde(
        default,
        deserialize_with = "deserialize_scope",
        skip_serializing_if = "Option::is_none"
    )]
    pub scope: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Access token expiry in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<u64>,

    /// Provider fields carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact_opt(self.refresh_token.as_deref()))
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expiry_date", &self.expiry_date)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact_opt(self.client_secret.as_deref()))
            .field("access_token", &redact_opt(self.access_token.as_deref()))
            .field("refresh_token", &redact_opt(self.refresh_token.as_deref()))
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expiry_date", &self.expiry_date)
            .finish_non_exhaustive()
    }
}

impl CredentialBundle {
    /// Build the initial bundle from an authorization code exchange
    #[must_use]
    pub fn from_token_set(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tokens: TokenSet,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token,
            scope: tokens.scope,
            token_type: tokens.token_type,
            expiry_date: tokens.expiry_date,
            extra: tokens.extra,
        }
    }

    /// Parse a bundle from its JSON form
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the text is not a bundle-shaped object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compact JSON form, as stored in env files
    ///
    /// # Errors
    ///
    /// Returns a JSON error if an extra field cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// `VAR=<json>` line for an env file
    ///
    /// # Errors
    ///
    /// Returns a JSON error if serialization fails.
    pub fn to_env_line(&self, var: &str) -> Result<String> {
        Ok(format!("{var}={}", self.to_json()?))
    }

    /// Individual granted scopes
    pub fn granted_scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().into_iter().flat_map(split_scopes)
    }

    /// Whether the granted scopes include [`REQUIRED_SCOPE`]
    #[must_use]
    pub fn has_required_scope(&self) -> bool {
        self.granted_scopes().any(|s| s == REQUIRED_SCOPE)
    }

    /// Name of the first field that is missing or empty, if any
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("client_id", truthy(self.client_id.as_ref())),
            ("client_secret", truthy(self.client_secret.as_ref())),
            ("access_token", truthy(self.access_token.as_ref())),
            ("refresh_token", truthy(self.refresh_token.as_ref())),
            ("scope", truthy(self.scope.as_ref())),
            ("token_type", truthy(self.token_type.as_ref())),
            ("expiry_date", self.expiry_date.is_some_and(|e| e != 0)),
        ]
        .into_iter()
        .find_map(|(name, present)| (!present).then_some(name))
    }

    /// Reason this bundle is unusable, or `None` when it is valid
    #[must_use]
    pub fn validation_error(&self) -> Option<String> {
        if let Some(field) = self.missing_field() {
            return Some(format!("missing `{field}`"));
        }
        if !self.has_required_scope() {
            return Some(format!("scope lacks {REQUIRED_SCOPE}"));
        }
        None
    }

    /// All seven fields are truthy and the required scope is granted
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation_error().is_none()
    }

    /// Expired at `now_ms`; a missing expiry counts as expired
    #[must_use]
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expiry_date.is_none_or(|expiry| expiry <= now_ms)
    }

    /// Expired against the system clock
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Time left before the access token expires, if any
    #[must_use]
    pub fn remaining_validity(&self) -> Option<Duration> {
        let now = now_millis();
        self.expiry_date
            .filter(|&expiry| expiry > now)
            .map(|expiry| Duration::from_millis(expiry - now))
    }

    /// Authorization header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!(
            "{} {}",
            self.token_type.as_deref().unwrap_or("Bearer"),
            self.access_token.as_deref().unwrap_or_default()
        )
    }

    /// Bundle after a refresh.
    ///
    /// Access token and expiry come from `refreshed`, as do scope and token
    /// type when reported. Client id, client secret and refresh token are
    /// always kept from `self`.
    #[must_use]
    pub fn merged_with(&self, refreshed: &TokenSet) -> Self {
        let mut merged = self.clone();
        merged.access_token = Some(refreshed.access_token.clone());
        merged.expiry_date = refreshed.expiry_date;
        if refreshed.scope.is_some() {
            merged.scope.clone_from(&refreshed.scope);
        }
        if refreshed.token_type.is_some() {
            merged.token_type.clone_from(&refreshed.token_type);
        }
        merged
            .extra
            .extend(refreshed.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}
