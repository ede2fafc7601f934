use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::runtime::ToolCall;
use crate::error::GatewayError;
use crate::interceptor::{DenialSignal, InvocationOutcome, ToolInvocationInterceptor};
use crate::tool::{ToolDescriptor, ToolResult};
use crate::types::UserId;

/// State handed to the pre-tool-call hook
///
/// The runtime holds the run's context; each call sees a copy whose `cancel`
/// is that call's own token.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub user: UserId,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            cancel: CancellationToken::new(),
        }
    }
}

/// What the runtime should do with a tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallControl {
    /// Run the tool body as usual
    Proceed,
    /// Do not run the tool; report why instead
    Block(NotExecuted),
    /// The hook already produced the result; use it instead of running the body
    Replace(ToolResult),
    /// The hook ran the body and it failed
    Failed(String),
}

/// Why a tool call produced no result
#[derive(Debug, Clone, PartialEq)]
pub enum NotExecutedReason {
    /// The operator declined the confirmation prompt
    Denied(DenialSignal),
    /// The grant was refused or the wait for it cancelled
    AuthorizationDenied(String),
    /// The user did not complete the grant in time
    AuthorizationTimeout(Duration),
    /// The tool provider failed
    Provider(String),
    /// No tool with that name is loaded
    UnknownTool,
    /// The arguments were not a JSON object
    InvalidArguments(String),
}

impl fmt::Display for NotExecutedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied(_) => write!(f, "the user declined the call"),
            Self::AuthorizationDenied(reason) => write!(f, "authorization was denied: {}", reason),
            Self::AuthorizationTimeout(waited) => write!(
                f,
                "authorization was not completed within {}s",
                waited.as_secs()
            ),
            Self::Provider(msg) => write!(f, "the tool provider failed: {}", msg),
            Self::UnknownTool => write!(f, "no such tool"),
            Self::InvalidArguments(msg) => write!(f, "invalid arguments: {}", msg),
        }
    }
}

/// A tool call that ended without a result from the tool
#[derive(Debug, Clone, PartialEq)]
pub struct NotExecuted {
    pub call_id: String,
    pub tool_name: String,
    pub reason: NotExecutedReason,
}

impl NotExecuted {
    pub fn new(call: &ToolCall, reason: NotExecutedReason) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            reason,
        }
    }

    pub fn is_denial(&self) -> bool {
        matches!(self.reason, NotExecutedReason::Denied(_))
    }

    /// The text the model sees in place of the tool's output
    pub fn as_tool_result(&self) -> ToolResult {
        ToolResult::text(format!("Call to {} was not executed: {}", self.tool_name, self.reason))
    }
}

/// The single hook an agent runtime invokes before running any tool
#[async_trait]
pub trait PreToolCallHook: Send + Sync {
    async fn before_tool_call(
        &self,
        call: &ToolCall,
        tool: &ToolDescriptor,
        context: &RunContext,
    ) -> ToolCallControl;
}

/// Routes every tool call through the invocation interceptor
///
/// The hook never fails: each gateway outcome becomes a control signal.
/// A result replaces the runtime's own execution of the body, a body that
/// ran and failed is reported as failed, and every refusal blocks the call
/// with a typed reason.
pub struct GatewayHook {
    interceptor: Arc<ToolInvocationInterceptor>,
}

impl GatewayHook {
    pub fn new(interceptor: Arc<ToolInvocationInterceptor>) -> Self {
        Self { interceptor }
    }
}

#[async_trait]
impl PreToolCallHook for GatewayHook {
    async fn before_tool_call(
        &self,
        call: &ToolCall,
        tool: &ToolDescriptor,
        context: &RunContext,
    ) -> ToolCallControl {
        let outcome = self
            .interceptor
            .invoke_with_cancel(tool, call.arguments.clone(), &context.user, &context.cancel)
            .await;

        match outcome {
            Ok(InvocationOutcome::Executed(result)) => ToolCallControl::Replace(result),
            Ok(InvocationOutcome::Denied(signal)) => {
                ToolCallControl::Block(NotExecuted::new(call, NotExecutedReason::Denied(signal)))
            }
            Err(err) => control_for(call, err),
        }
    }
}

fn control_for(call: &ToolCall, err: GatewayError) -> ToolCallControl {
    let reason = match err {
        GatewayError::Tool { source, .. } => return ToolCallControl::Failed(source.to_string()),
        GatewayError::AuthorizationDenied { reason, .. } => {
            NotExecutedReason::AuthorizationDenied(reason)
        }
        GatewayError::AuthorizationTimeout { waited, .. } => {
            NotExecutedReason::AuthorizationTimeout(waited)
        }
        GatewayError::Provider(err) => NotExecutedReason::Provider(err.to_string()),
    };
    ToolCallControl::Block(NotExecuted::new(call, reason))
}
