//! Error types for Google Photos credential handling

use thiserror::Error;

/// Command operators run to (re)generate a credential bundle
pub const GENERATOR_COMMAND: &str = "google-photos-token";

/// Main error type for credential acquisition and validation
#[derive(Error, Debug)]
pub enum AuthError {
    /// Operator declined a confirmation step
    #[error("{0}")]
    UserAborted(String),

    /// A required input was empty
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Provider rejected the authorization code
    #[error("{0}")]
    TokenExchangeFailed(String),

    /// Provider rejected the refresh token
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// No credential bundle in the configured source
    #[error("No token. Please generate one using `{GENERATOR_COMMAND}` command")]
    MissingToken,

    /// Credential bundle present but unusable
    #[error("Invalid token ({0}). Please regenerate one using `{GENERATOR_COMMAND}` command")]
    InvalidToken(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Create a user aborted error
    pub fn user_aborted(msg: impl Into<String>) -> Self {
        Self::UserAborted(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Create a token exchange error
    pub fn token_exchange(msg: impl Into<String>) -> Self {
        Self::TokenExchangeFailed(msg.into())
    }

    /// Create a refresh error
    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::RefreshFailed(msg.into())
    }

    /// Create an invalid token error
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the operator can recover by answering the prompt again
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ValidationFailed(_))
    }
}
