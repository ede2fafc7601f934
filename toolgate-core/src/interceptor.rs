use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::authorization::AuthorizationStore;
use crate::confirmation::ConfirmationGate;
use crate::error::GatewayError;
use crate::events::{GateEvent, Hooks};
use crate::locks::KeyedLocks;
use crate::tool::{ToolDescriptor, ToolResult};
use crate::types::UserId;

/// The user declined a confirmation prompt
///
/// This is an expected outcome, not an error: the conversation carries on
/// with the signal standing in for the tool's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialSignal {
    pub tool_name: String,
    pub user: UserId,
}

impl DenialSignal {
    pub fn new(tool_name: impl Into<String>, user: UserId) -> Self {
        Self {
            tool_name: tool_name.into(),
            user,
        }
    }
}

impl fmt::Display for DenialSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} declined the call to {}", self.user, self.tool_name)
    }
}

/// What a gated invocation produced
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// The tool ran; its result, untouched
    Executed(ToolResult),
    /// The operator said no; the tool did not run
    Denied(DenialSignal),
}

impl InvocationOutcome {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    pub fn result(&self) -> Option<&ToolResult> {
        match self {
            Self::Executed(result) => Some(result),
            Self::Denied(_) => None,
        }
    }
}

/// Wraps every tool invocation in the authorization and confirmation phases
///
/// For one call the phases run strictly in order: grant, then verdict, then
/// the tool body. Nothing the body does can happen before both checks pass.
/// Calls of the same tool are handled one at a time so their phases never
/// interleave.
pub struct ToolInvocationInterceptor {
    authorizations: Arc<AuthorizationStore>,
    gate: Arc<ConfirmationGate>,
    hooks: Hooks,
    invocations: KeyedLocks<String>,
}

impl ToolInvocationInterceptor {
    pub fn new(
        authorizations: Arc<AuthorizationStore>,
        gate: Arc<ConfirmationGate>,
        hooks: Hooks,
    ) -> Self {
        Self {
            authorizations,
            gate,
            hooks,
            invocations: KeyedLocks::new(),
        }
    }

    pub fn authorizations(&self) -> &Arc<AuthorizationStore> {
        &self.authorizations
    }

    pub fn gate(&self) -> &Arc<ConfirmationGate> {
        &self.gate
    }

    pub async fn invoke(
        &self,
        tool: &ToolDescriptor,
        arguments: Value,
        user: &UserId,
    ) -> Result<InvocationOutcome, GatewayError> {
        self.invoke_with_cancel(tool, arguments, user, &CancellationToken::new())
            .await
    }

    /// Like [`ToolInvocationInterceptor::invoke`]. Cancellation during the
    /// authorization wait is an authorization failure; during the prompt it
    /// is a denial. A body that already started is not interrupted.
    pub async fn invoke_with_cancel(
        &self,
        tool: &ToolDescriptor,
        arguments: Value,
        user: &UserId,
        cancel: &CancellationToken,
    ) -> Result<InvocationOutcome, GatewayError> {
        let _turn = self.invocations.lock(tool.name().to_string()).await;

        self.authorizations
            .ensure_authorized_with_cancel(user, tool, cancel)
            .await?;

        let verdict = self
            .gate
            .request_approval_with_cancel(tool, &arguments, cancel)
            .await;
        if !verdict.is_approved() {
            tracing::info!(user = %user, tool = tool.name(), "call declined by operator");
            return Ok(InvocationOutcome::Denied(DenialSignal::new(
                tool.name(),
                user.clone(),
            )));
        }

        self.hooks.emit(GateEvent::ToolExecuting {
            name: tool.name().to_string(),
        });
        let started = Instant::now();

        match tool.body().invoke(user, arguments).await {
            Ok(result) => {
                self.hooks.emit(GateEvent::ToolCompleted {
                    name: tool.name().to_string(),
                    output: result.clone(),
                    duration: started.elapsed(),
                });
                Ok(InvocationOutcome::Executed(result))
            }
            Err(source) => {
                tracing::warn!(tool = tool.name(), error = %source, "tool failed");
                self.hooks.emit(GateEvent::ToolFailed {
                    name: tool.name().to_string(),
                    error: source.to_string(),
                    duration: started.elapsed(),
                });
                Err(GatewayError::Tool {
                    tool: tool.name().to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrantPollConfig;
    use crate::confirmation::ConfirmationPolicy;
    use crate::provider::GrantStatus;
    use crate::test_utils::{CountingBody, EventCollector, MockToolProvider, ScriptedPrompter};
    use crate::tool::Sensitivity;
    use std::time::Duration;

    struct Fixture {
        interceptor: ToolInvocationInterceptor,
        provider: Arc<MockToolProvider>,
        prompter: Arc<ScriptedPrompter>,
        events: EventCollector,
    }

    fn fixture(provider: MockToolProvider, prompter: ScriptedPrompter) -> Fixture {
        let provider = Arc::new(provider);
        let prompter = Arc::new(prompter);
        let hooks = Hooks::new();
        let events = EventCollector::new();
        hooks.add(events.clone());

        let poll = GrantPollConfig::new(Duration::from_secs(2), Duration::from_secs(10));
        let authorizations = Arc::new(AuthorizationStore::with_hooks(
            provider.clone(),
            poll,
            hooks.clone(),
        ));
        let gate = Arc::new(ConfirmationGate::with_hooks(
            ConfirmationPolicy::default(),
            prompter.clone(),
            hooks.clone(),
        ));

        Fixture {
            interceptor: ToolInvocationInterceptor::new(authorizations, gate, hooks),
            provider,
            prompter,
            events,
        }
    }

    #[tokio::test]
    async fn test_approved_call_runs_body_with_original_arguments() {
        let f = fixture(
            MockToolProvider::new().already_granted(),
            ScriptedPrompter::replying(["y"]),
        );
        let body = CountingBody::returning(ToolResult::text("3 stories"));
        let tool = ToolDescriptor::new("SearchNews", body.clone());
        let args = serde_json::json!({"keywords": "rust", "limit": 3});

        let outcome = f
            .interceptor
            .invoke(&tool, args.clone(), &UserId::new("u1"))
            .await
            .unwrap();

        assert_eq!(outcome, InvocationOutcome::Executed(ToolResult::text("3 stories")));
        assert_eq!(body.calls(), 1);
        assert_eq!(body.arguments(), vec![args]);
    }

    #[tokio::test]
    async fn test_denied_call_never_reaches_body() {
        let f = fixture(
            MockToolProvider::new().already_granted(),
            ScriptedPrompter::replying(["n"]),
        );
        let body = CountingBody::returning(ToolResult::text("unused"));
        let tool = ToolDescriptor::new("SearchNews", body.clone());

        let outcome = f
            .interceptor
            .invoke(&tool, serde_json::json!({}), &UserId::new("u1"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InvocationOutcome::Denied(DenialSignal::new("SearchNews", UserId::new("u1")))
        );
        assert_eq!(body.calls(), 0);
        assert!(!f.events.names().contains(&"ToolExecuting"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorization_failure_skips_confirmation() {
        let f = fixture(MockToolProvider::new(), ScriptedPrompter::replying(["y"]));
        let body = CountingBody::returning(ToolResult::text("unused"));
        let tool = ToolDescriptor::new("SearchNews", body.clone());

        let err = f
            .interceptor
            .invoke(&tool, serde_json::json!({}), &UserId::new("u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::AuthorizationTimeout { .. }));
        assert_eq!(f.prompter.ask_count(), 0);
        assert_eq!(body.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_run_in_order() {
        let f = fixture(
            MockToolProvider::new().with_polls([GrantStatus::Complete]),
            ScriptedPrompter::replying(["yes"]),
        );
        let tool = ToolDescriptor::new("SearchNews", CountingBody::returning("ok".into()));

        f.interceptor
            .invoke(&tool, serde_json::json!({}), &UserId::new("u1"))
            .await
            .unwrap();

        assert_eq!(
            f.events.names(),
            vec![
                "AuthorizationRequired",
                "AuthorizationGranted",
                "ConfirmationRequested",
                "ConfirmationResolved",
                "ToolExecuting",
                "ToolCompleted",
            ]
        );
    }

    #[tokio::test]
    async fn test_confirmation_is_never_cached() {
        let f = fixture(
            MockToolProvider::new().already_granted(),
            ScriptedPrompter::replying(["y", "y", "n"]),
        );
        let body = CountingBody::returning("ok".into());
        let tool = ToolDescriptor::new("SearchNews", body.clone());
        let user = UserId::new("u1");

        for _ in 0..3 {
            f.interceptor
                .invoke(&tool, serde_json::json!({}), &user)
                .await
                .unwrap();
        }

        assert_eq!(f.prompter.ask_count(), 3);
        assert_eq!(f.provider.start_count(), 1);
        assert_eq!(body.calls(), 2);
    }

    #[tokio::test]
    async fn test_body_failure_is_tool_error() {
        let f = fixture(
            MockToolProvider::new().already_granted(),
            ScriptedPrompter::replying(["y"]),
        );
        let tool = ToolDescriptor::new("SearchNews", CountingBody::failing("quota exceeded"))
            .with_sensitivity(Sensitivity::Routine);

        let err = f
            .interceptor
            .invoke(&tool, serde_json::json!({}), &UserId::new("u1"))
            .await
            .unwrap_err();

        match err {
            GatewayError::Tool { tool, source } => {
                assert_eq!(tool, "SearchNews");
                assert_eq!(source.to_string(), "quota exceeded");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(f.events.names().last(), Some(&"ToolFailed"));
    }

    #[test]
    fn test_denial_signal_display() {
        let signal = DenialSignal::new("SearchNews", UserId::new("u1"));
        assert_eq!(signal.to_string(), "u1 declined the call to SearchNews");
    }
}
