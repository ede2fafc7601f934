//! Arcade tool provider
//!
//! Tools are exposed to the model under their underscore form
//! (`GoogleNews_SearchNewsStories`) and sent to the API under their dotted
//! qualified name (`GoogleNews.SearchNewsStories`).

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use toolgate_arcade_sdk::{
    Arcade, ArcadeError, AuthorizationResponse, AuthorizationStatus, AuthorizeToolRequest,
    ExecuteToolRequest, ListToolsParams, ToolDefinition,
};

use super::{GrantChallenge, GrantStatus, ProviderError, ToolProvider, ToolQuery, ToolSpec};
use crate::tool::{ToolError, ToolResult};
use crate::types::UserId;

/// Seconds the status endpoint may hold a poll open while a grant is pending
const DEFAULT_STATUS_WAIT: u32 = 1;

/// [`ToolProvider`] backed by the Arcade API
#[derive(Debug, Clone)]
pub struct ArcadeProvider {
    client: Arcade,
    status_wait: Option<u32>,
}

impl ArcadeProvider {
    pub fn new(client: Arcade) -> Self {
        Self {
            client,
            status_wait: Some(DEFAULT_STATUS_WAIT),
        }
    }

    /// Build a client from `ARCADE_API_KEY` (and optionally `ARCADE_BASE_URL`)
    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::new(Arcade::from_env()?))
    }

    /// How long the server may hold each status poll open; `None` to return
    /// immediately
    pub fn with_status_wait(mut self, wait: Option<u32>) -> Self {
        self.status_wait = wait;
        self
    }

    fn spec(definition: &ToolDefinition) -> ToolSpec {
        ToolSpec {
            name: definition.model_name(),
            provider_name: definition.qualified_name(),
            description: definition.description.clone(),
            toolkit: Some(definition.toolkit.name.clone()),
            requires_authorization: definition.requires_authorization(),
            input_schema: definition.input_schema(),
            sensitivity: None,
        }
    }
}

fn grant_status(response: &AuthorizationResponse) -> GrantStatus {
    match response.status {
        AuthorizationStatus::Completed => GrantStatus::Complete,
        AuthorizationStatus::Failed => GrantStatus::Failed("authorization failed".to_string()),
        AuthorizationStatus::NotStarted
        | AuthorizationStatus::Pending
        | AuthorizationStatus::Unknown => GrantStatus::Pending,
    }
}

impl From<ArcadeError> for ProviderError {
    fn from(err: ArcadeError) -> Self {
        match err {
            ArcadeError::Authentication(msg) => Self::Authentication(msg),
            ArcadeError::RateLimited(msg) => Self::RateLimited(msg),
            ArcadeError::ServiceUnavailable(msg) => Self::ServiceUnavailable(msg),
            ArcadeError::Network(msg) => Self::Network(msg),
            ArcadeError::InvalidResponse(msg) => Self::InvalidResponse(msg),
            ArcadeError::Json(err) => Self::InvalidResponse(err.to_string()),
            ArcadeError::Configuration(msg) => Self::Configuration(msg),
            ArcadeError::InvalidRequest(msg) | ArcadeError::NotFound(msg) | ArcadeError::Other(msg) => {
                Self::Other(msg)
            }
        }
    }
}

#[async_trait]
impl ToolProvider for ArcadeProvider {
    fn name(&self) -> &str {
        "arcade"
    }

    async fn list_tools(&self, query: &ToolQuery) -> Result<Vec<ToolSpec>, ProviderError> {
        // Individual tools are listed through their toolkit and filtered
        let wanted: BTreeSet<&str> = query.tools.iter().map(String::as_str).collect();
        let mut toolkits: Vec<&str> = query.toolkits.iter().map(String::as_str).collect();
        for tool in &query.tools {
            let toolkit = tool.split('.').next().unwrap_or(tool.as_str());
            if !toolkits.contains(&toolkit) {
                toolkits.push(toolkit);
            }
        }

        let mut specs = Vec::new();
        for toolkit in toolkits {
            let whole = query.toolkits.iter().any(|t| t == toolkit);
            let mut params = ListToolsParams::toolkit(toolkit);
            if query.limit > 0 {
                params = params.with_limit(query.limit);
            }
            let listed = self.client.tools().list(&params).await?;
            tracing::debug!(toolkit, count = listed.items.len(), "listed arcade tools");

            specs.extend(
                listed
                    .items
                    .iter()
                    .filter(|def| whole || wanted.contains(def.qualified_name().as_str()))
                    .map(Self::spec),
            );
        }
        Ok(specs)
    }

    async fn start_authorization(
        &self,
        user: &UserId,
        tool_name: &str,
    ) -> Result<GrantChallenge, ProviderError> {
        let response = self
            .client
            .tools()
            .authorize(&AuthorizeToolRequest::new(tool_name, user.as_str()))
            .await?;

        Ok(GrantChallenge {
            status: grant_status(&response),
            id: response.id,
            tool_name: tool_name.to_string(),
            url: response.url,
        })
    }

    async fn poll_authorization_status(
        &self,
        _user: &UserId,
        challenge: &GrantChallenge,
    ) -> Result<GrantStatus, ProviderError> {
        let id = challenge.id.as_deref().ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "authorization for '{}' has no id to poll",
                challenge.tool_name
            ))
        })?;
        let response = self.client.auth().status(id, self.status_wait).await?;
        Ok(grant_status(&response))
    }

    async fn invoke_tool_body(
        &self,
        user: &UserId,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolResult, ToolError> {
        let response = self
            .client
            .tools()
            .execute(&ExecuteToolRequest {
                tool_name: tool_name.to_string(),
                input: arguments,
                user_id: Some(user.as_str().to_string()),
            })
            .await
            .map_err(ProviderError::from)?;

        if !response.success {
            let message = response
                .error_message()
                .unwrap_or("tool execution failed without a message");
            return Err(ToolError::Custom(message.to_string()));
        }

        Ok(match response.value() {
            Some(Value::String(text)) => ToolResult::Text(text.clone()),
            Some(value) => ToolResult::Json(value.clone()),
            None => ToolResult::Json(Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: AuthorizationStatus) -> AuthorizationResponse {
        AuthorizationResponse {
            id: Some("ac_1".into()),
            status,
            url: None,
            scopes: Vec::new(),
            user_id: None,
        }
    }

    #[test]
    fn test_grant_status_mapping() {
        assert_eq!(
            grant_status(&response(AuthorizationStatus::Completed)),
            GrantStatus::Complete
        );
        assert!(matches!(
            grant_status(&response(AuthorizationStatus::Failed)),
            GrantStatus::Failed(_)
        ));
        for status in [
            AuthorizationStatus::NotStarted,
            AuthorizationStatus::Pending,
            AuthorizationStatus::Unknown,
        ] {
            assert_eq!(grant_status(&response(status)), GrantStatus::Pending);
        }
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            ProviderError::from(ArcadeError::Authentication("bad key".into())),
            ProviderError::Authentication(_)
        ));
        assert!(ProviderError::from(ArcadeError::RateLimited("slow".into())).is_retryable());
        assert!(matches!(
            ProviderError::from(ArcadeError::NotFound("no tool".into())),
            ProviderError::Other(_)
        ));
    }
}
