//! Gateway assembly
//!
//! [`GatewayBuilder`] collects the provider, the prompter and the
//! configuration, and moves the async work (listing tools) to
//! `.build().await`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::authorization::AuthorizationStore;
use crate::catalog::ToolCatalog;
use crate::config::GatewayConfig;
use crate::confirmation::{AutoDeny, ConfirmationGate, ConfirmationPrompter};
use crate::error::{Error, Result};
use crate::events::{GateHook, HookId, Hooks};
use crate::interceptor::ToolInvocationInterceptor;
use crate::provider::ToolProvider;
use crate::runner::{GatewayHook, RunContext, ToolRuntime};
use crate::types::UserId;

/// A fully wired human-in-the-loop gateway for one user
///
/// # Example
///
/// ```ignore
/// use toolgate_core::{Gateway, GatewayConfig, ToolCall};
///
/// # async fn example(provider: impl toolgate_core::ToolProvider + 'static,
/// #                  prompter: impl toolgate_core::ConfirmationPrompter + 'static)
/// #     -> toolgate_core::Result<()> {
/// let gateway = Gateway::builder()
///     .provider(provider)
///     .prompter(prompter)
///     .config(GatewayConfig::default())
///     .user("me@example.com")
///     .build()
///     .await?;
///
/// let runtime = gateway.runtime();
/// let outcome = runtime
///     .dispatch(ToolCall::new("call_1", "GoogleNews_SearchNewsStories",
///         serde_json::json!({"keywords": "rust"})))
///     .await;
/// # Ok(())
/// # }
/// ```
pub struct Gateway {
    user: UserId,
    config: GatewayConfig,
    catalog: Arc<ToolCatalog>,
    interceptor: Arc<ToolInvocationInterceptor>,
    hooks: Hooks,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn authorizations(&self) -> &Arc<AuthorizationStore> {
        self.interceptor.authorizations()
    }

    pub fn confirmation_gate(&self) -> &Arc<ConfirmationGate> {
        self.interceptor.gate()
    }

    pub fn interceptor(&self) -> &Arc<ToolInvocationInterceptor> {
        &self.interceptor
    }

    /// Add an event hook to observe authorization, confirmation and tool
    /// execution
    pub fn add_hook(&self, hook: impl GateHook + 'static) -> HookId {
        self.hooks.add(hook)
    }

    /// Returns `true` if the hook was found and removed
    pub fn remove_hook(&self, id: HookId) -> bool {
        self.hooks.remove(id)
    }

    /// A dispatch stage with this gateway registered as its pre-tool-call hook
    pub fn runtime(&self) -> ToolRuntime {
        self.runtime_with_cancel(CancellationToken::new())
    }

    /// Like [`Gateway::runtime`]; firing `cancel` abandons the whole run,
    /// the call in progress and every later one
    ///
    /// To abandon a single call use [`ToolRuntime::dispatch_with_cancel`].
    pub fn runtime_with_cancel(&self, cancel: CancellationToken) -> ToolRuntime {
        let context = RunContext {
            user: self.user.clone(),
            cancel,
        };
        let mut runtime = ToolRuntime::new(self.catalog.clone(), context, self.hooks.clone());
        runtime.register_hook(Arc::new(GatewayHook::new(self.interceptor.clone())));
        runtime
    }
}

/// Builder for creating a [`Gateway`]
pub struct GatewayBuilder {
    provider: Option<Arc<dyn ToolProvider>>,
    prompter: Option<Arc<dyn ConfirmationPrompter>>,
    config: GatewayConfig,
    user: Option<UserId>,
    catalog: Option<ToolCatalog>,
    hooks: Hooks,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            prompter: None,
            config: GatewayConfig::default(),
            user: None,
            catalog: None,
            hooks: Hooks::new(),
        }
    }

    pub fn provider(self, provider: impl ToolProvider + 'static) -> Self {
        self.shared_provider(Arc::new(provider))
    }

    pub fn shared_provider(mut self, provider: Arc<dyn ToolProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Where confirmation requests go. Without one, every request is denied.
    pub fn prompter(self, prompter: impl ConfirmationPrompter + 'static) -> Self {
        self.shared_prompter(Arc::new(prompter))
    }

    pub fn shared_prompter(mut self, prompter: Arc<dyn ConfirmationPrompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the user in the configuration
    pub fn user(mut self, user: impl Into<UserId>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Use these tools instead of listing them from the provider
    pub fn catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_hook(self, hook: impl GateHook + 'static) -> Self {
        self.hooks.add(hook);
        self
    }

    /// Load the catalog, validate the configuration against it and wire
    /// the components together
    pub async fn build(self) -> Result<Gateway> {
        let provider = self.provider.ok_or_else(|| {
            Error::Config("No tool provider configured. Call .provider() before .build()".to_string())
        })?;

        let user = match self.user {
            Some(user) => user,
            None => self.config.user_id()?,
        };
        self.config.validate()?;

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => ToolCatalog::load(provider.clone(), &self.config).await?,
        };
        self.config.validate_against(&catalog)?;
        if catalog.is_empty() {
            tracing::warn!(provider = provider.name(), "no tools loaded");
        }

        let prompter = self.prompter.unwrap_or_else(|| Arc::new(AutoDeny));
        let authorizations = Arc::new(AuthorizationStore::with_hooks(
            provider,
            self.config.authorization,
            self.hooks.clone(),
        ));
        let gate = Arc::new(ConfirmationGate::with_hooks(
            self.config.confirmation.clone(),
            prompter,
            self.hooks.clone(),
        ));
        let interceptor = Arc::new(ToolInvocationInterceptor::new(
            authorizations,
            gate,
            self.hooks.clone(),
        ));

        Ok(Gateway {
            user,
            config: self.config,
            catalog: Arc::new(catalog),
            interceptor,
            hooks: self.hooks,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
