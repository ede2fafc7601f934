//! # Toolgate
//!
//! A human-in-the-loop gateway for the tool calls of an AI agent.
//!
//! Before any tool body runs, the gateway makes sure that
//!
//! - the user has granted the third-party access the tool needs (an OAuth-style
//!   grant obtained through the tool provider, acquired lazily on first use and
//!   cached for the rest of the run), and
//! - a human has approved this exact invocation, if the tool is sensitive.
//!   Approvals are never cached.
//!
//! A denied call does not run and does not crash the run: the runtime gets a
//! [`NotExecuted`] outcome, and [`Conversation::recover_from`] folds it back
//! into the history so the next turn starts from a consistent state.
//!
//! ## Quick Start
//!
//! ```ignore
//! use toolgate_core::{ArcadeProvider, Gateway, GatewayConfig, ToolCall};
//!
//! #[tokio::main]
//! async fn main() -> toolgate_core::Result<()> {
//!     let config = GatewayConfig::load("toolgate.json").await?.apply_env()?;
//!
//!     let gateway = Gateway::builder()
//!         .provider(ArcadeProvider::from_env()?)
//!         .prompter(MyTerminalPrompter)
//!         .config(config)
//!         .build()
//!         .await?;
//!
//!     let runtime = gateway.runtime();
//!     let outcome = runtime
//!         .dispatch(ToolCall::new(
//!             "call_1",
//!             "GoogleNews_SearchNewsStories",
//!             serde_json::json!({"keywords": "rust"}),
//!         ))
//!         .await;
//!     println!("{}", outcome.as_tool_result().as_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! - [`AuthorizationStore`] - per-(user, tool) grant state and the grant poll loop
//! - [`ConfirmationGate`] - the approve/deny prompt for sensitive tools
//! - [`ToolInvocationInterceptor`] - wraps every tool body with both checks
//! - [`GatewayHook`] - plugs the interceptor into a runtime's pre-tool-call hook
//!
//! ## Feature Flags
//!
//! - `arcade` - [`ArcadeProvider`], a tool provider over the Arcade API
//! - `test-utils` - mock provider, scripted prompter and event collector

pub mod authorization;
pub mod catalog;
pub mod config;
pub mod confirmation;
pub mod conversation;
pub mod error;
pub mod events;
pub mod gateway;
pub mod interceptor;
pub mod provider;
pub mod runner;
pub mod tool;
pub mod types;

mod locks;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use authorization::{AuthorizationRecord, AuthorizationStatus, AuthorizationStore};
pub use catalog::ToolCatalog;
pub use config::{ConfigError, GatewayConfig, GrantPollConfig};
pub use confirmation::{
    is_affirmative, AutoDeny, ConfirmationGate, ConfirmationPolicy, ConfirmationPrompter,
    ConfirmationRequest, Verdict,
};
pub use conversation::{Conversation, Message, Role};
pub use error::{Error, GatewayError, Result};
pub use events::{GateEvent, GateHook, HookId, Hooks};
pub use gateway::{Gateway, GatewayBuilder};
pub use interceptor::{DenialSignal, InvocationOutcome, ToolInvocationInterceptor};

// Providers - core types always available
pub use provider::{
    GrantChallenge, GrantStatus, ProviderError, ToolProvider, ToolQuery, ToolSpec,
};

#[cfg(feature = "arcade")]
pub use provider::ArcadeProvider;

pub use runner::{
    GatewayHook, NotExecuted, NotExecutedReason, PreToolCallHook, RunContext, ToolCall,
    ToolCallControl, ToolCallOutcome, ToolRuntime,
};
pub use tool::{FnBody, Sensitivity, ToolBody, ToolDescriptor, ToolError, ToolResult};
pub use types::UserId;
