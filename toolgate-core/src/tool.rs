use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::ProviderError;
use crate::types::UserId;

/// How much care a tool needs before it runs
///
/// `Sensitive` tools require a human verdict at the point of use unless the
/// confirmation policy says otherwise. `Routine` tools run without a prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    #[default]
    Sensitive,
    Routine,
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensitivity::Sensitive => write!(f, "sensitive"),
            Sensitivity::Routine => write!(f, "routine"),
        }
    }
}

/// Result returned by a tool body, passed through the gateway verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolResult {
    /// Plain text response
    Text(String),

    /// Structured JSON data
    Json(Value),
}

impl ToolResult {
    /// Create a JSON result from any serializable type
    pub fn json<T: Serialize>(value: T) -> Result<Self, serde_json::Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Create a text result from a string
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Text content, or the compact JSON rendering
    pub fn as_text(&self) -> String {
        match self {
            ToolResult::Text(s) => s.clone(),
            ToolResult::Json(v) => v.to_string(),
        }
    }

    /// Get a reference to the text content if this is a Text variant
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ToolResult::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for ToolResult {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ToolResult {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Errors that can occur while a tool body runs
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Custom(String),
}

impl From<String> for ToolError {
    fn from(s: String) -> Self {
        Self::Custom(s)
    }
}

impl From<&str> for ToolError {
    fn from(s: &str) -> Self {
        Self::Custom(s.to_string())
    }
}

/// The callable that performs a tool's real action
///
/// Bodies are only ever reached through the invocation interceptor, after
/// the authorization and confirmation phases have both passed.
#[async_trait]
pub trait ToolBody: Send + Sync {
    async fn invoke(&self, user: &UserId, arguments: Value) -> Result<ToolResult, ToolError>;
}

/// Adapts a synchronous closure into a [`ToolBody`]
///
/// ```
/// use toolgate_core::{FnBody, ToolResult};
///
/// let echo = FnBody::new(|args| Ok(ToolResult::Json(args)));
/// ```
pub struct FnBody<F> {
    f: F,
}

impl<F> FnBody<F>
where
    F: Fn(Value) -> Result<ToolResult, ToolError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ToolBody for FnBody<F>
where
    F: Fn(Value) -> Result<ToolResult, ToolError> + Send + Sync,
{
    async fn invoke(&self, _user: &UserId, arguments: Value) -> Result<ToolResult, ToolError> {
        (self.f)(arguments)
    }
}

/// An invocable tool as seen by the gateway
///
/// Descriptors are built when the catalog is loaded and never change
/// afterwards. The catalog owns them behind `Arc`; the interceptor only
/// borrows.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    toolkit: Option<String>,
    provider_name: String,
    sensitivity: Sensitivity,
    requires_authorization: bool,
    input_schema: Value,
    body: Arc<dyn ToolBody>,
}

impl ToolDescriptor {
    /// Create a sensitive tool that needs a per-user grant
    pub fn new(name: impl Into<String>, body: impl ToolBody + 'static) -> Self {
        Self::with_shared_body(name, Arc::new(body))
    }

    /// Like [`ToolDescriptor::new`] for a body that is already shared
    pub fn with_shared_body(name: impl Into<String>, body: Arc<dyn ToolBody>) -> Self {
        let name = name.into();
        Self {
            provider_name: name.clone(),
            name,
            description: String::new(),
            toolkit: None,
            sensitivity: Sensitivity::default(),
            requires_authorization: true,
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
            body,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_toolkit(mut self, toolkit: impl Into<String>) -> Self {
        self.toolkit = Some(toolkit.into());
        self
    }

    /// Name the provider knows this tool by, when it differs from the
    /// model-facing name
    pub fn with_provider_name(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = provider_name.into();
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_requires_authorization(mut self, required: bool) -> Self {
        self.requires_authorization = required;
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn toolkit(&self) -> Option<&str> {
        self.toolkit.as_deref()
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.sensitivity
    }

    pub fn requires_authorization(&self) -> bool {
        self.requires_authorization
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    pub(crate) fn body(&self) -> &Arc<dyn ToolBody> {
        &self.body
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("toolkit", &self.toolkit)
            .field("provider_name", &self.provider_name)
            .field("sensitivity", &self.sensitivity)
            .field("requires_authorization", &self.requires_authorization)
            .finish_non_exhaustive()
    }
}
