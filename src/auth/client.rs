//! Authenticated client handle that keeps its access token fresh

use std::sync::{PoisonError, RwLock};

use super::bundle::{Clock, CredentialBundle, system_clock};
use super::oauth::OAuthClient;
use crate::callbacks::{RefreshEvent, RefreshListener, SharedRefreshListener};
use crate::error::{AuthError, Result};

/// Client handle handed to data-fetching code.
///
/// Every authorized request goes through [`AuthClient::access_token`], which
/// renews an expired access token with the refresh token before returning it.
/// Renewals are serialized, and listeners see one [`RefreshEvent`] at a time.
pub struct AuthClient {
    oauth: OAuthClient,
    credentials: RwLock<CredentialBundle>,
    refresh_lock: tokio::sync::Mutex<()>,
    listeners: Vec<SharedRefreshListener>,
    clock: Clock,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("client_id", &self.oauth.client_id())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    /// Create a handle with the given active credentials
    #[must_use]
    pub fn new(oauth: OAuthClient, credentials: CredentialBundle) -> Self {
        Self {
            oauth,
            credentials: RwLock::new(credentials),
            refresh_lock: tokio::sync::Mutex::new(()),
            listeners: Vec::new(),
            clock: system_clock(),
        }
    }

    /// Use a different clock for expiry checks
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Register a refresh listener. Must happen before the handle is shared.
    pub fn on_refresh(&mut self, listener: impl RefreshListener + 'static) {
        self.listeners.push(std::sync::Arc::new(listener));
    }

    /// Number of registered refresh listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Provider client used for refreshes
    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// Snapshot of the active credentials
    #[must_use]
    pub fn credentials(&self) -> CredentialBundle {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the active credentials
    pub fn set_credentials(&self, credentials: CredentialBundle) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    /// Whether the active access token is expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.credentials().is_expired_at((self.clock)())
    }

    /// Current access token, refreshed first if it has expired.
    ///
    /// # Errors
    ///
    /// Returns `RefreshFailed` if there is no refresh token or the provider
    /// rejects it.
    pub async fn access_token(&self) -> Result<String> {
        if !self.is_expired() {
            return self.current_access_token();
        }

        let _refreshing = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        let current = self.credentials();
        if !current.is_expired_at((self.clock)()) {
            return self.current_access_token();
        }

        let refresh_token = current
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::refresh("no refresh token available"))?;

        let tokens = self.oauth.refresh(refresh_token).await?;
        let refreshed = current.merged_with(&tokens);
        self.set_credentials(refreshed.clone());
        tracing::debug!(expiry_date = ?refreshed.expiry_date, "Access token refreshed");

        let event = RefreshEvent {
            tokens,
            credentials: refreshed,
        };
        for listener in &self.listeners {
            if let Err(e) = listener.on_refresh(event.clone()).await {
                tracing::warn!("Refresh listener failed: {e}");
            }
        }

        self.current_access_token()
    }

    fn current_access_token(&self) -> Result<String> {
        self.credentials()
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::invalid_token("missing `access_token`"))
    }

    /// Attach a bearer token to a request
    ///
    /// # Errors
    ///
    /// Returns an error if the access token cannot be refreshed.
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        let token = self.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    /// Authorized GET request against an API URL
    ///
    /// # Errors
    ///
    /// Returns an error if the access token cannot be refreshed.
    pub async fn get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        self.authorize(self.oauth.http().get(url)).await
    }
}
