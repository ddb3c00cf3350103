//! OAuth credentials for the Google Photos Library API
//!
//! # Overview
//!
//! A [`CredentialBundle`] is the unit everything here revolves around: the
//! registered application's id and secret plus the tokens Google granted for
//! the read-only Photos Library scope. It is stored as one JSON object in the
//! `GOOGLE_PHOTOS_TOKEN` environment variable; loaders also accept the older
//! `GATSBY_SOURCE_GOOGLE_PHOTOS_TOKEN` name.
//!
//! - [`OAuthClient`] talks to the authorization and token endpoints.
//! - [`AuthClient`] is the authenticated handle API code uses; it refreshes
//!   the access token when it has expired.
//! - [`CredentialSource`] and [`CredentialSink`] abstract where bundles are
//!   read from and appended to.
//!
//! # Example
//!
//! ```no_run
//! use google_photos_auth::auth::{AuthClient, CredentialBundle, OAuthClient, OAuthConfig};
//!
//! # async fn example(json: &str) -> google_photos_auth::Result<()> {
//! let bundle = CredentialBundle::from_json(json)?;
//! let oauth = OAuthClient::new(
//!     bundle.client_id.clone().unwrap_or_default(),
//!     bundle.client_secret.clone().unwrap_or_default(),
//!     OAuthConfig::default(),
//! );
//! let client = AuthClient::new(oauth, bundle);
//! let request = client
//!     .get("https://photoslibrary.googleapis.com/v1/albums")
//!     .await?;
//! # let _ = request;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - Env files created by the generator get user-only permissions (600)
//! - `Debug` output of bundles redacts secrets and tokens

mod bundle;
mod client;
mod oauth;
mod storage;

pub use bundle::{
    Clock, CredentialBundle, REQUIRED_SCOPE, TokenSet, now_millis, system_clock,
};
pub use client::AuthClient;
pub use oauth::{DEFAULT_REDIRECT_URI, OAuthClient, OAuthConfig, PkceChallenge};
pub use storage::{
    CredentialSink, CredentialSource, DEFAULT_ENV_FILE, EnvFileSink, EnvSource,
    LEGACY_TOKEN_ENV_VAR, TOKEN_ENV_VAR,
};
