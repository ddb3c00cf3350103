//! Trait-based listeners for access token refresh events.
//!
//! [`AuthClient`](crate::auth::AuthClient) renews its access token on its own
//! whenever a request finds it expired. Listeners registered on the client are
//! told about every renewal, in registration order, one event at a time.
//!
//! # Example: Implementing `RefreshListener`
//!
//! ```no_run
//! use google_photos_auth::callbacks::{RefreshEvent, RefreshListener};
//! use google_photos_auth::Result;
//! use async_trait::async_trait;
//!
//! struct LogRefresh;
//!
//! #[async_trait]
//! impl RefreshListener for LogRefresh {
//!     async fn on_refresh(&self, event: RefreshEvent) -> Result<()> {
//!         println!("new token expires at {:?}", event.tokens.expiry_date);
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::auth::{CredentialBundle, TokenSet};
use crate::error::Result;

/// A completed access token refresh
#[derive(Debug, Clone)]
pub struct RefreshEvent {
    /// Fields returned by the token endpoint
    pub tokens: TokenSet,
    /// The client's credentials after the refresh was applied
    pub credentials: CredentialBundle,
}

/// Observer for access token refreshes.
///
/// Errors returned by a listener are logged by the client and do not fail
/// the request that triggered the refresh.
#[async_trait]
pub trait RefreshListener: Send + Sync {
    /// Called after the client stored a refreshed access token
    async fn on_refresh(&self, event: RefreshEvent) -> Result<()>;
}

#[async_trait]
impl RefreshListener for Box<dyn RefreshListener> {
    async fn on_refresh(&self, event: RefreshEvent) -> Result<()> {
        (**self).on_refresh(event).await
    }
}

#[async_trait]
impl<T: RefreshListener + ?Sized> RefreshListener for Arc<T> {
    async fn on_refresh(&self, event: RefreshEvent) -> Result<()> {
        (**self).on_refresh(event).await
    }
}

/// Type alias for a shared refresh listener.
pub type SharedRefreshListener = Arc<dyn RefreshListener>;

/// Boxed future returned by closure listeners
pub type RefreshFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Wrapper to convert a closure into a `RefreshListener`.
///
/// # Example
///
/// ```no_run
/// use google_photos_auth::callbacks::{FnRefreshListener, RefreshListener};
/// use std::sync::Arc;
///
/// let listener = FnRefreshListener::new(|event| {
///     Box::pin(async move {
///         println!("refreshed: {:?}", event.credentials.expiry_date);
///         Ok(())
///     })
/// });
///
/// let shared: Arc<dyn RefreshListener> = Arc::new(listener);
/// ```
pub struct FnRefreshListener<F>
where
    F: Fn(RefreshEvent) -> RefreshFuture + Send + Sync,
{
    func: F,
}

impl<F> FnRefreshListener<F>
where
    F: Fn(RefreshEvent) -> RefreshFuture + Send + Sync,
{
    /// Create a new closure-based refresh listener.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> RefreshListener for FnRefreshListener<F>
where
    F: Fn(RefreshEvent) -> RefreshFuture + Send + Sync,
{
    async fn on_refresh(&self, event: RefreshEvent) -> Result<()> {
        (self.func)(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RefreshListener for CountingListener {
        async fn on_refresh(&self, _event: RefreshEvent) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn event() -> RefreshEvent {
        RefreshEvent {
            tokens: TokenSet {
                access_token: "fresh".to_string(),
                ..Default::default()
            },
            credentials: CredentialBundle::default(),
        }
    }

    #[tokio::test]
    async fn test_arc_wrapped_listener() {
        let listener = Arc::new(CountingListener {
            calls: AtomicUsize::new(0),
        });
        let shared: SharedRefreshListener = listener.clone();

        shared.on_refresh(event()).await.unwrap();
        shared.on_refresh(event()).await.unwrap();

        assert_eq!(listener.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_event_debug_hides_tokens() {
        let mut event = event();
        event.tokens.access_token = "ya29.a0SuperSecretAccess".to_string();
        event.credentials.access_token = Some("ya29.a0SuperSecretAccess".to_string());
        event.credentials.refresh_token = Some("1//0gSuperSecretRefresh".to_string());

        let debug = format!("{event:?}");
        assert!(!debug.contains("SuperSecret"));
    }

    #[tokio::test]
    async fn test_fn_refresh_listener_receives_event() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = seen.clone();
        let listener = FnRefreshListener::new(move |event| {
            let sink = sink.clone();
            Box::pin(async move {
                *sink.lock().unwrap() = Some(event.tokens.access_token);
                Ok(())
            })
        });

        listener.on_refresh(event()).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("fresh"));
    }
}
