//! Arcade API client

use crate::auth::{AuthorizationResponse, AuthorizeToolRequest};
use crate::error::{parse_error_response, ArcadeError, RetryConfig};
use crate::tools::{ExecuteToolRequest, ExecuteToolResponse, ListToolsParams, ListToolsResponse};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;

/// Default API base URL
const DEFAULT_API_BASE: &str = "https://api.arcade.dev";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Arcade API client
#[derive(Clone)]
pub struct Arcade {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    retry_config: RetryConfig,
}

impl std::fmt::Debug for Arcade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arcade")
            .field("api_base", &self.api_base)
            .field("api_key", &"[REDACTED]")
            .field("retry_config", &self.retry_config)
            .finish()
    }
}

impl Arcade {
    /// Create a new client with an explicit API key
    pub fn new(api_key: impl Into<String>) -> Result<Self, ArcadeError> {
        Self::builder().api_key(api_key).build()
    }

    /// Create a client from `ARCADE_API_KEY` (and optionally `ARCADE_BASE_URL`)
    pub fn from_env() -> Result<Self, ArcadeError> {
        let api_key = std::env::var("ARCADE_API_KEY").map_err(|_| {
            ArcadeError::Configuration("ARCADE_API_KEY environment variable not set".to_string())
        })?;
        let mut builder = Self::builder().api_key(api_key);
        if let Ok(base) = std::env::var("ARCADE_BASE_URL") {
            builder = builder.api_base(base);
        }
        builder.build()
    }

    /// Create a builder for more advanced configuration
    pub fn builder() -> ArcadeBuilder {
        ArcadeBuilder::new()
    }

    /// Base URL requests are sent to
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get a handle to the tools API
    pub fn tools(&self) -> Tools<'_> {
        Tools { client: self }
    }

    /// Get a handle to the auth API
    pub fn auth(&self) -> Auth<'_> {
        Auth { client: self }
    }

    fn headers(&self) -> Result<HeaderMap, ArcadeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| ArcadeError::Configuration(format!("Invalid API key: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Execute a request with automatic retry on transient failures
    async fn execute_with_retry<T>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, ArcadeError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.send(method, path, query, body, self.retry_config.max_retries)
            .await
    }

    /// Execute a request exactly once
    ///
    /// For requests with side effects on the provider: a failed attempt may
    /// still have been applied, so it is never repeated.
    async fn execute_once<T>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, ArcadeError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.send(method, path, query, body, 0).await
    }

    async fn send<T>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        max_retries: u32,
    ) -> Result<T, ArcadeError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.api_base.trim_end_matches('/'), path);
        let headers = self.headers()?;
        let mut last_error: Option<ArcadeError> = None;

        for attempt in 0..=max_retries {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .headers(headers.clone());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(b) = body {
                request = request.json(b);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            ArcadeError::InvalidResponse(format!("Failed to parse response: {}", e))
                        });
                    }

                    let status_code = status.as_u16();
                    let retry_after = RetryConfig::parse_retry_after(response.headers());
                    let error_body = response.text().await.unwrap_or_default();
                    let error = parse_error_response(&error_body, status_code);

                    if attempt < max_retries
                        && ArcadeError::is_retryable_status(status_code)
                    {
                        let delay =
                            retry_after.unwrap_or_else(|| self.retry_config.delay_for_attempt(attempt));
                        tracing::debug!(%url, status_code, attempt, ?delay, "retrying arcade request");
                        tokio::time::sleep(delay).await;
                        last_error = Some(error);
                        continue;
                    }

                    return Err(error);
                }
                Err(e) => {
                    let error = ArcadeError::from_reqwest_error(e);

                    if attempt < max_retries && error.is_retryable() {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::debug!(%url, attempt, ?delay, error = %error, "retrying arcade request");
                        tokio::time::sleep(delay).await;
                        last_error = Some(error);
                        continue;
                    }

                    return Err(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ArcadeError::Other("Max retries exceeded".to_string())))
    }
}

/// Builder for Arcade client configuration
///
/// The `api_key` is required.
pub struct ArcadeBuilder {
    api_key: Option<String>,
    api_base: Option<String>,
    timeout: Option<Duration>,
    retry_config: Option<RetryConfig>,
}

impl ArcadeBuilder {
    fn new() -> Self {
        Self {
            api_key: None,
            api_base: None,
            timeout: None,
            retry_config: None,
        }
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a custom API base URL
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the maximum number of retries (default: 2)
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        let mut config = self.retry_config.take().unwrap_or_default();
        config.max_retries = max_retries;
        self.retry_config = Some(config);
        self
    }

    /// Set custom retry configuration
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<Arcade, ArcadeError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ArcadeError::Configuration("API key is required".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| {
                ArcadeError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Arcade {
            client,
            api_key,
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            retry_config: self.retry_config.unwrap_or_default(),
        })
    }
}

// ============================================================================
// Tools API
// ============================================================================

/// Tools API handle
pub struct Tools<'a> {
    client: &'a Arcade,
}

impl<'a> Tools<'a> {
    /// List tool definitions
    pub async fn list(&self, params: &ListToolsParams) -> Result<ListToolsResponse, ArcadeError> {
        let mut query = Vec::new();
        if let Some(ref toolkit) = params.toolkit {
            query.push(("toolkit", toolkit.clone()));
        }
        if let Some(limit) = params.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(offset) = params.offset {
            query.push(("offset", offset.to_string()));
        }
        self.client
            .execute_with_retry(reqwest::Method::GET, "/v1/tools", &query, None)
            .await
    }

    /// Start (or look up) a user's authorization for a tool
    pub async fn authorize(
        &self,
        request: &AuthorizeToolRequest,
    ) -> Result<AuthorizationResponse, ArcadeError> {
        let body = serde_json::to_value(request)?;
        self.client
            .execute_with_retry(reqwest::Method::POST, "/v1/tools/authorize", &[], Some(&body))
            .await
    }

    /// Execute a tool on behalf of a user
    ///
    /// Sent once, whatever the retry configuration: the tool may have run
    /// even when the response is an error.
    pub async fn execute(
        &self,
        request: &ExecuteToolRequest,
    ) -> Result<ExecuteToolResponse, ArcadeError> {
        let body = serde_json::to_value(request)?;
        self.client
            .execute_once(reqwest::Method::POST, "/v1/tools/execute", &[], Some(&body))
            .await
    }
}

// ============================================================================
// Auth API
// ============================================================================

/// Auth API handle
pub struct Auth<'a> {
    client: &'a Arcade,
}

impl<'a> Auth<'a> {
    /// Check the status of an authorization
    ///
    /// With `wait`, the server holds the request open for up to that many
    /// seconds while the authorization is still pending.
    pub async fn status(
        &self,
        id: &str,
        wait: Option<u32>,
    ) -> Result<AuthorizationResponse, ArcadeError> {
        let mut query = vec![("id", id.to_string())];
        if let Some(wait) = wait {
            query.push(("wait", wait.to_string()));
        }
        self.client
            .execute_with_retry(reqwest::Method::GET, "/v1/auth/status", &query, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_api_key() {
        let result = Arcade::builder().build();
        assert!(matches!(result, Err(ArcadeError::Configuration(_))));

        let blank = Arcade::builder().api_key("   ").build();
        assert!(matches!(blank, Err(ArcadeError::Configuration(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let client = Arcade::new("test-key").unwrap();
        assert_eq!(client.api_base(), DEFAULT_API_BASE);
    }

    #[test]
    fn test_client_debug_redacts_api_key() {
        let client = Arcade::new("super-secret-key").unwrap();
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super-secret-key"));
    }
}
