//! # Google Photos credentials for Rust
//!
//! OAuth2 credential lifecycle for the Google Photos Library API (read-only
//! scope): acquire a refresh token once through an interactive flow, persist
//! it as JSON in `GOOGLE_PHOTOS_TOKEN`, and hand out an authenticated client
//! that renews its access token on demand.
//!
//! ## Quick Start
//!
//! Load the persisted bundle and get an authenticated client with
//! [`CredentialGuard`]:
//!
//! ```no_run
//! use google_photos_auth::CredentialGuard;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let guard = CredentialGuard::from_env();
//!     let client = guard.auth()?;
//!
//!     let albums = client
//!         .get("https://photoslibrary.googleapis.com/v1/albums")
//!         .await?
//!         .send()
//!         .await?;
//!     println!("{}", albums.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Acquiring a token with [`AuthorizationFlow`]
//!
//! The flow walks the operator through creating a Google Cloud project and an
//! OAuth client, shows the consent URL, exchanges the pasted code and appends
//! the bundle to the project's `.env` files. Console I/O is behind the
//! [`Prompter`] trait; the `google-photos-token` binary ships a terminal
//! implementation.
//!
//! ```no_run
//! # use google_photos_auth::{AuthorizationFlow, Prompter};
//! # use google_photos_auth::auth::{EnvFileSink, OAuthConfig, TOKEN_ENV_VAR};
//! # async fn example(prompter: &mut dyn Prompter) -> google_photos_auth::Result<()> {
//! let sink = EnvFileSink::discover(".", TOKEN_ENV_VAR)?;
//! let flow = AuthorizationFlow::new(OAuthConfig::default(), sink);
//! let outcome = flow.run(prompter).await?;
//! println!("written to {:?}", outcome.targets);
//! # Ok(())
//! # }
//! ```
//!
//! ### 2. Refresh notifications
//!
//! When the loaded access token is already expired, the guard subscribes to
//! the client's refreshes and merges each renewed token back into its cache.
//! Other code can listen too:
//!
//! ```no_run
//! # use google_photos_auth::{AuthClient, FnRefreshListener};
//! # fn example(client: &mut AuthClient) {
//! client.on_refresh(FnRefreshListener::new(|event| {
//!     Box::pin(async move {
//!         println!("new expiry: {:?}", event.tokens.expiry_date);
//!         Ok(())
//!     })
//! }));
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`auth`]: bundle model, provider client, authenticated client, storage
//! - [`flow`]: interactive authorization-code flow
//! - [`guard`]: lazy loading, validation and refresh merging
//! - [`callbacks`]: refresh listener trait
//! - [`error`]: error types and handling
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Secrets never appear in events; bundles print redacted.
//! To see logs, attach a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, AuthError>`](Result):
//!
//! ```no_run
//! # use google_photos_auth::{AuthError, CredentialGuard};
//! # fn example(guard: &CredentialGuard) {
//! match guard.token() {
//!     Ok(bundle) => { /* ... */ }
//!     Err(AuthError::MissingToken) => {
//!         eprintln!("run `google-photos-token` first");
//!     }
//!     Err(e) => {
//!         eprintln!("Error: {}", e);
//!     }
//! }
//! # }
//! ```
//!
//! ## Security
//!
//! - **PKCE** - Consent URLs carry an S256 code challenge
//! - **File permissions** - Env files created by the generator are user-only (600)
//! - **Redaction** - `Debug` output of bundles never shows secrets or tokens

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod callbacks;
pub mod error;
pub mod flow;
pub mod guard;
pub mod utils;

// Re-export commonly used types
pub use auth::{
    AuthClient, CredentialBundle, CredentialSink, CredentialSource, EnvFileSink, EnvSource,
    OAuthClient, OAuthConfig, REQUIRED_SCOPE, TOKEN_ENV_VAR, TokenSet,
};
pub use callbacks::{FnRefreshListener, RefreshEvent, RefreshListener, SharedRefreshListener};
pub use error::{AuthError, Result};
pub use flow::{AuthorizationFlow, FlowOutcome, Prompter};
pub use guard::{CredentialGuard, GuardOptions};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
