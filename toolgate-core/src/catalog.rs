use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{ConfigError, GatewayConfig};
use crate::provider::{ProviderError, ToolProvider, ToolSpec};
use crate::tool::{ToolBody, ToolDescriptor, ToolError, ToolResult};
use crate::types::UserId;

/// Tools available to a run, in load order
///
/// Loaded once at session start. Descriptors are shared behind `Arc` and
/// never change afterwards.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<Arc<ToolDescriptor>>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// List tools from `provider` and build descriptors whose bodies call
    /// back into it
    ///
    /// Sensitivity comes from the configured override, then the provider's
    /// hint, then the configured default.
    pub async fn load(
        provider: Arc<dyn ToolProvider>,
        config: &GatewayConfig,
    ) -> Result<Self, ProviderError> {
        let specs = provider.list_tools(&config.tool_query()).await?;
        tracing::debug!(provider = provider.name(), count = specs.len(), "listed tools");

        let mut catalog = Self::new();
        for spec in specs {
            let descriptor = describe(spec, &provider, config);
            let name = descriptor.name().to_string();
            if catalog.insert(descriptor).is_err() {
                tracing::warn!(tool = %name, "provider listed the same tool twice, keeping the first");
            }
        }
        Ok(catalog)
    }

    /// Add a descriptor. Names must be unique.
    pub fn insert(&mut self, tool: ToolDescriptor) -> Result<(), ConfigError> {
        if self.index.contains_key(tool.name()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate tool name '{}'",
                tool.name()
            )));
        }
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolDescriptor>> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn describe(spec: ToolSpec, provider: &Arc<dyn ToolProvider>, config: &GatewayConfig) -> ToolDescriptor {
    let sensitivity = config
        .sensitivity
        .get(&spec.name)
        .copied()
        .or(spec.sensitivity)
        .unwrap_or(config.default_sensitivity);

    let body = RemoteToolBody {
        provider: provider.clone(),
        provider_name: spec.provider_name.clone(),
    };

    let mut descriptor = ToolDescriptor::new(spec.name, body)
        .with_provider_name(spec.provider_name)
        .with_description(spec.description)
        .with_sensitivity(sensitivity)
        .with_requires_authorization(spec.requires_authorization)
        .with_input_schema(spec.input_schema);
    if let Some(toolkit) = spec.toolkit {
        descriptor = descriptor.with_toolkit(toolkit);
    }
    descriptor
}

/// Body of a provider-hosted tool
struct RemoteToolBody {
    provider: Arc<dyn ToolProvider>,
    provider_name: String,
}

#[async_trait]
impl ToolBody for RemoteToolBody {
    async fn invoke(&self, user: &UserId, arguments: Value) -> Result<ToolResult, ToolError> {
        self.provider
            .invoke_tool_body(user, &self.provider_name, arguments)
            .await
    }
}
