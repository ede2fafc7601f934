//! Tool providers
//!
//! This module contains the `ToolProvider` trait the gateway consumes and,
//! behind the `arcade` feature, an implementation over the Arcade API.

#[cfg(feature = "arcade")]
pub mod arcade;

use async_trait::async_trait;
use serde_json::Value;

use crate::tool::{Sensitivity, ToolError, ToolResult};
use crate::types::UserId;

#[cfg(feature = "arcade")]
pub use arcade::ArcadeProvider;

/// Error types for tool providers
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting or throttling
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Network or connectivity issues
    #[error("Network error: {0}")]
    Network(String),

    /// Service unavailable or temporary issues
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The provider answered with something we could not use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration (missing API key, unknown toolkit, etc.)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Other provider-specific errors that don't fit above categories
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Returns true if retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Network(_) | Self::ServiceUnavailable(_)
        )
    }
}

/// Which tools to load at session start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolQuery {
    /// Whole toolkits to load (e.g. `GoogleNews`)
    pub toolkits: Vec<String>,
    /// Individual tools to load, by their provider name (e.g. `Gmail.SendEmail`)
    pub tools: Vec<String>,
    /// Maximum number of tools per toolkit
    pub limit: u32,
}

/// A tool as listed by the provider, before it becomes a descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    /// Model-facing name, unique within the catalog
    pub name: String,
    /// Name used when talking to the provider
    pub provider_name: String,
    pub description: String,
    pub toolkit: Option<String>,
    pub requires_authorization: bool,
    pub input_schema: Value,
    /// Provider's own sensitivity hint, if it has one
    pub sensitivity: Option<Sensitivity>,
}

/// Progress of a per-user grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantStatus {
    /// The user has not completed the grant yet
    Pending,
    /// The grant exists and the tool may be used
    Complete,
    /// The provider refused the grant
    Failed(String),
}

/// Provider response to starting an authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantChallenge {
    /// Provider handle used when polling, if the provider issues one
    pub id: Option<String>,
    pub tool_name: String,
    /// Where the user completes the grant; absent when already granted
    pub url: Option<String>,
    pub status: GrantStatus,
}

/// The external service that lists, authorizes and executes tools
///
/// Implementations must be cheap to share; the gateway holds them behind
/// `Arc` and calls them from concurrent invocations.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Short name for logs (e.g. "arcade")
    fn name(&self) -> &str;

    /// List available tools. Called once at session start.
    async fn list_tools(&self, query: &ToolQuery) -> Result<Vec<ToolSpec>, ProviderError>;

    /// Begin (or look up) the grant for `user` to use `tool_name`
    async fn start_authorization(
        &self,
        user: &UserId,
        tool_name: &str,
    ) -> Result<GrantChallenge, ProviderError>;

    /// Check how a previously started grant is progressing
    async fn poll_authorization_status(
        &self,
        user: &UserId,
        challenge: &GrantChallenge,
    ) -> Result<GrantStatus, ProviderError>;

    /// Run the tool's real action on behalf of `user`
    async fn invoke_tool_body(
        &self,
        user: &UserId,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolResult, ToolError>;
}
