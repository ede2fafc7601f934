//! Error types for toolgate
//!
//! [`GatewayError`] is what a single gated tool invocation can fail with.
//! [`Error`] flattens every layer into the categories application code
//! usually acts on.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::ProviderError;
use crate::tool::ToolError;
use crate::types::UserId;

/// Why a gated invocation produced no result
///
/// A user declining a confirmation prompt is not an error; that outcome is
/// [`crate::DenialSignal`].
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider refused the grant, or the wait for it was cancelled
    #[error("authorization of '{tool}' for user {user} was denied: {reason}")]
    AuthorizationDenied {
        tool: String,
        user: UserId,
        reason: String,
    },

    /// The user did not complete the grant in time
    #[error("authorization of '{tool}' for user {user} did not complete within {}s", .waited.as_secs())]
    AuthorizationTimeout {
        tool: String,
        user: UserId,
        waited: Duration,
    },

    /// The provider could not be reached or answered nonsense
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The tool body ran and failed
    #[error("tool '{tool}' failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: ToolError,
    },
}

impl GatewayError {
    /// Returns true if this failure came out of the authorization phase
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationDenied { .. } | Self::AuthorizationTimeout { .. }
        )
    }
}

/// Top-level error type for toolgate operations
///
/// - [`Error::Config`] - Fix configuration and restart
/// - [`Error::Auth`] - Credentials for the provider are wrong
/// - [`Error::Authorization`] - The user did not grant a tool
/// - [`Error::RateLimited`] / [`Error::Network`] / [`Error::Unavailable`] - Retry later
/// - [`Error::Tool`] - A tool ran and failed
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (unknown tool name, missing user id, bad value)
    #[error("configuration error: {0}")]
    Config(String),

    /// The provider rejected our credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A per-user tool grant was refused or not completed
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Rate limited - slow down requests
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network connectivity issue
    #[error("network error: {0}")]
    Network(String),

    /// Service temporarily unavailable
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Tool execution failed
    #[error("tool error: {0}")]
    Tool(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Authorization(_))
    }

    /// Returns true if this error is potentially retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Network(_) | Self::Unavailable(_)
        )
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Authentication(msg) => Self::Auth(msg),
            ProviderError::RateLimited(msg) => Self::RateLimited(msg),
            ProviderError::Network(msg) => Self::Network(msg),
            ProviderError::ServiceUnavailable(msg) => Self::Unavailable(msg),
            ProviderError::Configuration(msg) => Self::Config(msg),
            ProviderError::InvalidResponse(msg) | ProviderError::Other(msg) => Self::Other(msg),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        Self::Tool(err.to_string())
    }
}

impl From<GatewayError> for Error {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Provider(err) => err.into(),
            err @ GatewayError::Tool { .. } => Self::Tool(err.to_string()),
            err => Self::Authorization(err.to_string()),
        }
    }
}

/// Result type alias for toolgate operations
pub type Result<T> = std::result::Result<T, Error>;
