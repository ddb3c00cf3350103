//! Load-once credential guard shared by everything that calls the API
//!
//! The guard is created by the process entry point and cloned into whatever
//! needs an authenticated client. The first access reads the configured
//! [`CredentialSource`], validates the bundle and builds an [`AuthClient`];
//! later accesses reuse both.
//!
//! When the stored access token is already expired at load time, the guard
//! listens for the client's refresh events and folds the renewed access token
//! back into its cached bundle (and the optional sink). Refreshed bundles that
//! fail validation are dropped and the previous bundle stays cached.
//!
//! # Example
//!
//! ```no_run
//! use google_photos_auth::CredentialGuard;
//!
//! # async fn example() -> google_photos_auth::Result<()> {
//! let guard = CredentialGuard::from_env();
//! let client = guard.auth()?;
//! let albums = client
//!     .get("https://photoslibrary.googleapis.com/v1/albums")
//!     .await?
//!     .send()
//!     .await?;
//! # let _ = albums;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use typed_builder::TypedBuilder;

use crate::auth::{
    AuthClient, Clock, CredentialBundle, CredentialSink, CredentialSource, EnvSource,
    OAuthClient, OAuthConfig, system_clock,
};
use crate::callbacks::{RefreshEvent, RefreshListener};
use crate::error::{AuthError, Result};

/// Shared credential source
pub type SharedSource = Arc<dyn CredentialSource>;

/// Shared credential sink
pub type SharedSink = Arc<dyn CredentialSink>;

/// Construction options for [`CredentialGuard`]
#[derive(TypedBuilder)]
pub struct GuardOptions {
    /// Where the persisted bundle is read from
    #[builder(default = default_source())]
    pub source: SharedSource,

    /// Provider endpoints used for refreshes
    #[builder(default)]
    pub config: OAuthConfig,

    /// Receives refreshed bundles, if set
    #[builder(default, setter(strip_option))]
    pub sink: Option<SharedSink>,

    /// Clock for the load-time expiry check
    #[builder(default = system_clock())]
    pub clock: Clock,
}

fn default_source() -> SharedSource {
    Arc::new(EnvSource::default())
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

struct GuardState {
    options: GuardOptions,
    token: RwLock<Option<Arc<CredentialBundle>>>,
    auth: RwLock<Option<Arc<AuthClient>>>,
    token_init: Mutex<()>,
    auth_init: Mutex<()>,
}

impl GuardState {
    fn cached_token(&self) -> Option<Arc<CredentialBundle>> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cached_auth(&self) -> Option<Arc<AuthClient>> {
        self.auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_token(&self, bundle: CredentialBundle) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(bundle));
    }
}

/// Cheaply cloneable handle over the process's credentials
#[derive(Clone)]
pub struct CredentialGuard {
    state: Arc<GuardState>,
}

impl std::fmt::Debug for CredentialGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGuard")
            .field("token", &self.state.cached_token())
            .field("auth", &self.state.cached_auth())
            .finish_non_exhaustive()
    }
}

impl CredentialGuard {
    /// Create a guard; nothing is read until first use
    #[must_use]
    pub fn new(options: GuardOptions) -> Self {
        Self {
            state: Arc::new(GuardState {
                options,
                token: RwLock::new(None),
                auth: RwLock::new(None),
                token_init: Mutex::new(()),
                auth_init: Mutex::new(()),
            }),
        }
    }

    /// Guard reading `GOOGLE_PHOTOS_TOKEN` (or its legacy name, or `./.env`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GuardOptions::default())
    }

    /// Guard reading from a custom source with default options otherwise
    #[must_use]
    pub fn with_source(source: impl CredentialSource + 'static) -> Self {
        Self::new(GuardOptions::builder().source(Arc::new(source)).build())
    }

    /// The validated bundle, loaded on first call.
    ///
    /// Returns the same `Arc` on every call until a refresh replaces it. A
    /// failed load is not remembered; the next call reads the source again.
    ///
    /// # Errors
    ///
    /// - `MissingToken` if the source holds nothing
    /// - `InvalidToken` if the stored bundle is malformed or lacks the scope
    pub fn token(&self) -> Result<Arc<CredentialBundle>> {
        if let Some(token) = self.state.cached_token() {
            return Ok(token);
        }

        let _loading = self
            .state
            .token_init
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = self.state.cached_token() {
            return Ok(token);
        }

        let bundle = Arc::new(self.load()?);
        *self
            .state
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(bundle.clone());
        tracing::debug!(expiry_date = ?bundle.expiry_date, "Credential bundle loaded");
        Ok(bundle)
    }

    fn load(&self) -> Result<CredentialBundle> {
        let raw = self
            .state
            .options
            .source
            .read()?
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(AuthError::MissingToken)?;

        let bundle = CredentialBundle::from_json(&raw)
            .map_err(|e| AuthError::invalid_token(format!("not a credential bundle: {e}")))?;

        match bundle.validation_error() {
            Some(reason) => Err(AuthError::invalid_token(reason)),
            None => Ok(bundle),
        }
    }

    /// Replace the cached bundle if `candidate` is valid.
    ///
    /// Invalid candidates are ignored without error; the return value tells
    /// whether the cache changed.
    pub fn set_token(&self, candidate: CredentialBundle) -> bool {
        if let Some(reason) = candidate.validation_error() {
            tracing::debug!(%reason, "Ignoring invalid credential bundle");
            return false;
        }
        self.state.replace_token(candidate);
        true
    }

    /// The authenticated client, built on first call.
    ///
    /// # Errors
    ///
    /// Propagates `MissingToken` / `InvalidToken` from [`Self::token`].
    pub fn auth(&self) -> Result<Arc<AuthClient>> {
        if let Some(auth) = self.state.cached_auth() {
            return Ok(auth);
        }

        let bundle = self.token()?;

        let _building = self
            .state
            .auth_init
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(auth) = self.state.cached_auth() {
            return Ok(auth);
        }

        let client = Arc::new(self.build_client(&bundle));
        self.set_auth(client.clone());
        Ok(client)
    }

    fn build_client(&self, bundle: &CredentialBundle) -> AuthClient {
        let options = &self.state.options;
        let oauth = OAuthClient::new(
            bundle.client_id.clone().unwrap_or_default(),
            bundle.client_secret.clone().unwrap_or_default(),
            options.config.clone(),
        );
        let mut client = AuthClient::new(oauth, bundle.clone()).with_clock(options.clock.clone());

        if bundle.is_expired_at((options.clock)()) {
            client.on_refresh(GuardRefreshHook {
                state: Arc::downgrade(&self.state),
            });
            tracing::debug!("Access token expired, refresh hook installed");
        }

        client
    }

    /// Substitute the authenticated client
    pub fn set_auth(&self, client: Arc<AuthClient>) {
        *self.state.auth.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
    }

    /// Whether the current client reports refreshes back to this guard
    #[must_use]
    pub fn has_refresh_listener(&self) -> bool {
        self.state
            .cached_auth()
            .is_some_and(|auth| auth.listener_count() > 0)
    }
}

/// Folds refresh events back into the guard that built the client
struct GuardRefreshHook {
    state: Weak<GuardState>,
}

#[async_trait]
impl RefreshListener for GuardRefreshHook {
    async fn on_refresh(&self, event: RefreshEvent) -> Result<()> {
        let Some(state) = self.state.upgrade() else {
            return Ok(());
        };
        let Some(current) = state.cached_token() else {
            return Ok(());
        };

        let merged = current.merged_with(&event.tokens);
        if let Some(reason) = merged.validation_error() {
            tracing::debug!(%reason, "Dropping refreshed credentials, keeping cached bundle");
            return Ok(());
        }

        state.replace_token(merged.clone());
        if let Some(auth) = state.cached_auth() {
            auth.set_credentials(merged.clone());
        }
        if let Some(sink) = &state.options.sink {
            if let Err(e) = sink.store(&merged) {
                tracing::warn!("Failed to persist refreshed credentials: {e}");
            }
        }
        Ok(())
    }
}
