//! Per-user tool authorization types

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/tools/authorize`
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeToolRequest {
    pub tool_name: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
}

impl AuthorizeToolRequest {
    pub fn new(tool_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            user_id: user_id.into(),
            tool_version: None,
        }
    }
}

/// State of an authorization as reported by the provider
///
/// Unrecognized values deserialize as [`AuthorizationStatus::Unknown`] so a
/// newer server cannot break polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotStarted,
    Pending,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl AuthorizationStatus {
    /// No further polling can change the outcome
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Response of both the authorize and the auth status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: AuthorizationStatus,
    /// URL the user must visit to complete the grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}
