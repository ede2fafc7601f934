use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::hook::{NotExecuted, NotExecutedReason, PreToolCallHook, RunContext, ToolCallControl};
use crate::catalog::ToolCatalog;
use crate::events::{GateEvent, Hooks};
use crate::tool::ToolResult;

/// A tool call proposed by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// What came of a dispatched tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallOutcome {
    Completed {
        call_id: String,
        tool_name: String,
        result: ToolResult,
    },
    /// The body ran and returned an error
    Failed {
        call_id: String,
        tool_name: String,
        error: String,
    },
    NotExecuted(NotExecuted),
}

impl ToolCallOutcome {
    /// The result the model sees for this call
    pub fn as_tool_result(&self) -> ToolResult {
        match self {
            Self::Completed { result, .. } => result.clone(),
            Self::Failed {
                tool_name, error, ..
            } => ToolResult::text(format!("Call to {} failed: {}", tool_name, error)),
            Self::NotExecuted(not_executed) => not_executed.as_tool_result(),
        }
    }

    pub fn not_executed(&self) -> Option<&NotExecuted> {
        match self {
            Self::NotExecuted(not_executed) => Some(not_executed),
            Self::Completed { .. } | Self::Failed { .. } => None,
        }
    }
}

/// Tool-dispatch stage of an agent run
///
/// Validates each call against the catalog, fires the registered
/// [`PreToolCallHook`] and honours its control signal. Exactly one hook can
/// be registered; registering another replaces it.
///
/// Every dispatch runs under its own cancellation token, a child of the
/// run's. Cancelling one call leaves later calls untouched; cancelling the
/// run's token cancels every call.
pub struct ToolRuntime {
    catalog: Arc<ToolCatalog>,
    context: RunContext,
    hooks: Hooks,
    pre_tool_call: Option<Arc<dyn PreToolCallHook>>,
}

impl ToolRuntime {
    pub fn new(catalog: Arc<ToolCatalog>, context: RunContext, hooks: Hooks) -> Self {
        Self {
            catalog,
            context,
            hooks,
            pre_tool_call: None,
        }
    }

    pub fn register_hook(&mut self, hook: Arc<dyn PreToolCallHook>) {
        self.pre_tool_call = Some(hook);
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// A fresh token for one call, cancelled along with the run
    pub fn call_token(&self) -> CancellationToken {
        self.context.cancel.child_token()
    }

    pub async fn dispatch(&self, call: ToolCall) -> ToolCallOutcome {
        self.dispatch_with_cancel(call, self.call_token()).await
    }

    /// Like [`ToolRuntime::dispatch`]; firing `cancel` abandons this call's
    /// grant wait or confirmation prompt
    ///
    /// Take the token from [`ToolRuntime::call_token`] so the run's own
    /// cancellation still reaches the call.
    pub async fn dispatch_with_cancel(
        &self,
        call: ToolCall,
        cancel: CancellationToken,
    ) -> ToolCallOutcome {
        let context = RunContext {
            user: self.context.user.clone(),
            cancel,
        };
        self.hooks.emit(GateEvent::ToolRequested {
            call_id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        if !call.arguments.is_object() {
            return self.not_executed(
                &call,
                NotExecutedReason::InvalidArguments(format!(
                    "expected a JSON object, got {}",
                    json_kind(&call.arguments)
                )),
            );
        }

        let Some(tool) = self.catalog.get(&call.name) else {
            return self.not_executed(&call, NotExecutedReason::UnknownTool);
        };

        let control = match &self.pre_tool_call {
            Some(hook) => hook.before_tool_call(&call, &tool, &context).await,
            None => ToolCallControl::Proceed,
        };

        match control {
            ToolCallControl::Replace(result) => self.completed(&call, result),
            ToolCallControl::Block(not_executed) => self.blocked(not_executed),
            ToolCallControl::Failed(error) => self.failed(&call, error),
            ToolCallControl::Proceed => {
                self.hooks.emit(GateEvent::ToolExecuting {
                    name: call.name.clone(),
                });
                let started = Instant::now();
                match tool.body().invoke(&context.user, call.arguments.clone()).await {
                    Ok(result) => {
                        self.hooks.emit(GateEvent::ToolCompleted {
                            name: call.name.clone(),
                            output: result.clone(),
                            duration: started.elapsed(),
                        });
                        self.completed(&call, result)
                    }
                    Err(err) => {
                        self.hooks.emit(GateEvent::ToolFailed {
                            name: call.name.clone(),
                            error: err.to_string(),
                            duration: started.elapsed(),
                        });
                        self.failed(&call, err.to_string())
                    }
                }
            }
        }
    }

    fn completed(&self, call: &ToolCall, result: ToolResult) -> ToolCallOutcome {
        ToolCallOutcome::Completed {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
        }
    }

    fn failed(&self, call: &ToolCall, error: String) -> ToolCallOutcome {
        tracing::debug!(call_id = %call.id, tool = %call.name, %error, "tool call failed");
        ToolCallOutcome::Failed {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            error,
        }
    }

    fn not_executed(&self, call: &ToolCall, reason: NotExecutedReason) -> ToolCallOutcome {
        self.blocked(NotExecuted::new(call, reason))
    }

    fn blocked(&self, not_executed: NotExecuted) -> ToolCallOutcome {
        tracing::debug!(
            call_id = %not_executed.call_id,
            tool = %not_executed.tool_name,
            reason = %not_executed.reason,
            "tool call not executed"
        );
        self.hooks.emit(GateEvent::ToolNotExecuted {
            call_id: not_executed.call_id.clone(),
            name: not_executed.tool_name.clone(),
            reason: not_executed.reason.to_string(),
        });
        ToolCallOutcome::NotExecuted(not_executed)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CountingBody, EventCollector};
    use crate::tool::ToolDescriptor;
    use crate::types::UserId;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Fixed(ToolCallControl);

    /// Records whether each call arrived already cancelled
    #[derive(Default)]
    struct SeesCancel(Mutex<Vec<bool>>);

    #[async_trait]
    impl PreToolCallHook for SeesCancel {
        async fn before_tool_call(
            &self,
            _call: &ToolCall,
            _tool: &ToolDescriptor,
            context: &RunContext,
        ) -> ToolCallControl {
            self.0.lock().push(context.cancel.is_cancelled());
            ToolCallControl::Replace("ok".into())
        }
    }

    #[async_trait]
    impl PreToolCallHook for Fixed {
        async fn before_tool_call(
            &self,
            _call: &ToolCall,
            _tool: &ToolDescriptor,
            _context: &RunContext,
        ) -> ToolCallControl {
            self.0.clone()
        }
    }

    fn runtime(body: CountingBody) -> (ToolRuntime, EventCollector) {
        let mut catalog = ToolCatalog::new();
        catalog.insert(ToolDescriptor::new("SearchNews", body)).unwrap();
        let hooks = Hooks::new();
        let events = EventCollector::new();
        hooks.add(events.clone());
        let runtime = ToolRuntime::new(Arc::new(catalog), RunContext::new(UserId::new("u1")), hooks);
        (runtime, events)
    }

    #[tokio::test]
    async fn test_without_hook_runs_body() {
        let body = CountingBody::returning("ok".into());
        let (runtime, _) = runtime(body.clone());

        let outcome = runtime
            .dispatch(ToolCall::new("c1", "SearchNews", serde_json::json!({})))
            .await;

        assert_eq!(outcome.as_tool_result(), ToolResult::text("ok"));
        assert_eq!(body.calls(), 1);
    }

    #[tokio::test]
    async fn test_replace_skips_body() {
        let body = CountingBody::returning("from body".into());
        let (mut runtime, _) = runtime(body.clone());
        runtime.register_hook(Arc::new(Fixed(ToolCallControl::Replace("from hook".into()))));

        let outcome = runtime
            .dispatch(ToolCall::new("c1", "SearchNews", serde_json::json!({})))
            .await;

        assert_eq!(
            outcome,
            ToolCallOutcome::Completed {
                call_id: "c1".into(),
                tool_name: "SearchNews".into(),
                result: ToolResult::text("from hook"),
            }
        );
        assert_eq!(body.calls(), 0);
    }

    #[tokio::test]
    async fn test_block_is_reported() {
        let body = CountingBody::returning("unused".into());
        let (mut runtime, events) = runtime(body.clone());
        let call = ToolCall::new("c1", "SearchNews", serde_json::json!({}));
        let blocked = NotExecuted::new(&call, NotExecutedReason::Provider("down".into()));
        runtime.register_hook(Arc::new(Fixed(ToolCallControl::Block(blocked.clone()))));

        let outcome = runtime.dispatch(call).await;

        assert_eq!(outcome.not_executed(), Some(&blocked));
        assert_eq!(body.calls(), 0);
        assert_eq!(events.names(), vec!["ToolRequested", "ToolNotExecuted"]);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (runtime, _) = runtime(CountingBody::returning("ok".into()));
        let outcome = runtime
            .dispatch(ToolCall::new("c1", "Nope", serde_json::json!({})))
            .await;
        assert_eq!(
            outcome.not_executed().map(|n| &n.reason),
            Some(&NotExecutedReason::UnknownTool)
        );
    }

    #[tokio::test]
    async fn test_non_object_arguments_rejected() {
        let body = CountingBody::returning("ok".into());
        let (runtime, _) = runtime(body.clone());

        for arguments in [serde_json::json!("rust"), serde_json::json!([1, 2]), Value::Null] {
            let outcome = runtime
                .dispatch(ToolCall::new("c1", "SearchNews", arguments))
                .await;
            assert!(matches!(
                outcome.not_executed().map(|n| &n.reason),
                Some(NotExecutedReason::InvalidArguments(_))
            ));
        }
        assert_eq!(body.calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_body_without_hook() {
        let (runtime, _) = runtime(CountingBody::failing("boom"));
        let outcome = runtime
            .dispatch(ToolCall::new("c1", "SearchNews", serde_json::json!({})))
            .await;
        assert_eq!(
            outcome,
            ToolCallOutcome::Failed {
                call_id: "c1".into(),
                tool_name: "SearchNews".into(),
                error: "boom".into(),
            }
        );
        assert!(outcome.not_executed().is_none());
        assert_eq!(
            outcome.as_tool_result().as_text(),
            "Call to SearchNews failed: boom"
        );
    }

    #[tokio::test]
    async fn test_hook_reported_failure() {
        let body = CountingBody::returning("unused".into());
        let (mut runtime, events) = runtime(body.clone());
        runtime.register_hook(Arc::new(Fixed(ToolCallControl::Failed("quota".into()))));

        let outcome = runtime
            .dispatch(ToolCall::new("c1", "SearchNews", serde_json::json!({})))
            .await;

        assert!(matches!(outcome, ToolCallOutcome::Failed { ref error, .. } if error == "quota"));
        assert_eq!(body.calls(), 0);
        assert_eq!(events.names(), vec!["ToolRequested"]);
    }

    #[tokio::test]
    async fn test_cancelled_call_leaves_next_call_alone() {
        let (mut runtime, _) = runtime(CountingBody::returning("ok".into()));
        let hook = Arc::new(SeesCancel::default());
        runtime.register_hook(hook.clone());

        let cancel = runtime.call_token();
        cancel.cancel();
        runtime
            .dispatch_with_cancel(ToolCall::new("c1", "SearchNews", serde_json::json!({})), cancel)
            .await;
        runtime
            .dispatch(ToolCall::new("c2", "SearchNews", serde_json::json!({})))
            .await;

        assert_eq!(*hook.0.lock(), vec![true, false]);
        assert!(!runtime.context().cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_run_reaches_every_call() {
        let (mut runtime, _) = runtime(CountingBody::returning("ok".into()));
        let hook = Arc::new(SeesCancel::default());
        runtime.register_hook(hook.clone());

        let pending = runtime.call_token();
        runtime.context().cancel.cancel();
        runtime
            .dispatch_with_cancel(ToolCall::new("c1", "SearchNews", serde_json::json!({})), pending)
            .await;
        runtime
            .dispatch(ToolCall::new("c2", "SearchNews", serde_json::json!({})))
            .await;

        assert_eq!(*hook.0.lock(), vec![true, true]);
    }
}
