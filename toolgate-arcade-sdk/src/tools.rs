//! Tool catalog and execution types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::AuthorizationResponse;

// ============================================================================
// Listing
// ============================================================================

/// Query parameters for `GET /v1/tools`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListToolsParams {
    /// Restrict to a single toolkit (e.g. `GoogleNews`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolkit: Option<String>,

    /// Maximum number of items to return
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Offset for pagination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ListToolsParams {
    /// List the tools of one toolkit
    pub fn toolkit(name: impl Into<String>) -> Self {
        Self {
            toolkit: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Response of `GET /v1/tools`
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResponse {
    #[serde(default)]
    pub items: Vec<ToolDefinition>,
    #[serde(default)]
    pub total_count: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// A tool as described by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub toolkit: ToolkitDefinition,
    #[serde(default)]
    pub input: ToolInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<ToolRequirements>,
}

impl ToolDefinition {
    /// Name used when calling the API, e.g. `GoogleNews.SearchNewsStories`
    pub fn qualified_name(&self) -> String {
        self.qualified_name
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.toolkit.name, self.name))
    }

    /// Name safe to expose to a model, e.g. `GoogleNews_SearchNewsStories`
    pub fn model_name(&self) -> String {
        self.qualified_name().replace('.', "_")
    }

    /// Whether the provider requires a per-user grant for this tool
    pub fn requires_authorization(&self) -> bool {
        self.requirements
            .as_ref()
            .and_then(|r| r.authorization.as_ref())
            .is_some()
    }

    /// JSON schema of the input parameters
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.input.parameters {
            let mut schema = Map::new();
            schema.insert(
                "type".to_string(),
                Value::String(param.value_schema.json_type().to_string()),
            );
            if let Some(ref description) = param.description {
                schema.insert(
                    "description".to_string(),
                    Value::String(description.clone()),
                );
            }
            if let Some(ref values) = param.value_schema.enumeration {
                schema.insert(
                    "enum".to_string(),
                    Value::Array(values.iter().cloned().map(Value::String).collect()),
                );
            }
            properties.insert(param.name.clone(), Value::Object(schema));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Toolkit a tool belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Declared input of a tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub parameters: Vec<InputParameter>,
}

/// A single named input parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputParameter {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value_schema: ValueSchema,
}

/// Type information for an input parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSchema {
    pub val_type: String,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<String>>,
}

impl ValueSchema {
    /// Map the provider's type names onto JSON schema types
    pub fn json_type(&self) -> &str {
        match self.val_type.as_str() {
            "string" => "string",
            "integer" => "integer",
            "number" => "number",
            "boolean" => "boolean",
            "array" => "array",
            "json" => "object",
            _ => "string",
        }
    }
}

/// Requirements a tool places on the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<ToolAuthorizationRequirement>,
}

/// The OAuth provider a tool needs a grant for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAuthorizationRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
}

// ============================================================================
// Execution
// ============================================================================

/// Body of `POST /v1/tools/execute`
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteToolRequest {
    pub tool_name: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Response of `POST /v1/tools/execute`
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteToolResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<ToolOutput>,
}

impl ExecuteToolResponse {
    /// Error message reported by the tool, if it failed
    pub fn error_message(&self) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|o| o.error.as_ref())
            .map(|e| e.message.as_str())
    }

    /// Value produced by the tool, if any
    pub fn value(&self) -> Option<&Value> {
        self.output.as_ref().and_then(|o| o.value.as_ref())
    }
}

/// Output section of an execution response
#[derive(Debug, Clone, Deserialize)]
pub struct ToolOutput {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<ToolOutputError>,
    #[serde(default)]
    pub authorization: Option<AuthorizationResponse>,
}

/// Error reported by a tool execution
#[derive(Debug, Clone, Deserialize)]
pub struct ToolOutputError {
    pub message: String,
    #[serde(default)]
    pub developer_message: Option<String>,
    #[serde(default)]
    pub can_retry: bool,
}
