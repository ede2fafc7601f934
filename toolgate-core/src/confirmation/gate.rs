use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{is_affirmative, ConfirmationPolicy, ConfirmationPrompter, ConfirmationRequest, Verdict};
use crate::events::{GateEvent, Hooks};
use crate::locks::KeyedLocks;
use crate::tool::ToolDescriptor;

/// Decides per invocation whether a human must approve, and asks them
///
/// At most one confirmation request per tool is outstanding at any time: a
/// second call of the same tool waits until the first verdict is recorded
/// before its own prompt goes out.
pub struct ConfirmationGate {
    policy: ConfirmationPolicy,
    prompter: Arc<dyn ConfirmationPrompter>,
    hooks: Hooks,
    turns: KeyedLocks<String>,
}

impl ConfirmationGate {
    pub fn new(policy: ConfirmationPolicy, prompter: Arc<dyn ConfirmationPrompter>) -> Self {
        Self::with_hooks(policy, prompter, Hooks::new())
    }

    pub fn with_hooks(
        policy: ConfirmationPolicy,
        prompter: Arc<dyn ConfirmationPrompter>,
        hooks: Hooks,
    ) -> Self {
        Self {
            policy,
            prompter,
            hooks,
            turns: KeyedLocks::new(),
        }
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    pub fn requires_confirmation(&self, tool: &ToolDescriptor) -> bool {
        self.policy.requires_confirmation(tool)
    }

    /// Returns `Approved` or `Denied`, never `Pending`
    pub async fn request_approval(&self, tool: &ToolDescriptor, arguments: &Value) -> Verdict {
        self.request_approval_with_cancel(tool, arguments, &CancellationToken::new())
            .await
    }

    /// Like [`ConfirmationGate::request_approval`]; cancellation is a denial
    pub async fn request_approval_with_cancel(
        &self,
        tool: &ToolDescriptor,
        arguments: &Value,
        cancel: &CancellationToken,
    ) -> Verdict {
        if !self.requires_confirmation(tool) {
            return Verdict::Approved;
        }

        let _turn = tokio::select! {
            guard = self.turns.lock(tool.name().to_string()) => guard,
            _ = cancel.cancelled() => return Verdict::Denied,
        };

        let mut request = ConfirmationRequest::new(tool, arguments.clone());
        tracing::debug!(tool = tool.name(), request_id = %request.id(), "requesting confirmation");
        self.hooks.emit(GateEvent::ConfirmationRequested {
            request_id: request.id(),
            tool_name: request.tool_name().to_string(),
            arguments: request.arguments().clone(),
            summary: request.summary(),
        });

        let reply = tokio::select! {
            reply = self.wait_for_reply(&request) => reply,
            _ = cancel.cancelled() => None,
        };

        let verdict = match reply.as_deref() {
            Some(reply) if is_affirmative(reply) => Verdict::Approved,
            _ => Verdict::Denied,
        };
        request.resolve(verdict);

        tracing::debug!(tool = tool.name(), request_id = %request.id(), ?verdict, "confirmation resolved");
        self.hooks.emit(GateEvent::ConfirmationResolved {
            request_id: request.id(),
            tool_name: request.tool_name().to_string(),
            verdict,
        });

        request.verdict()
    }

    async fn wait_for_reply(&self, request: &ConfirmationRequest) -> Option<String> {
        match self.policy.timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.prompter.ask(request)).await {
                Ok(reply) => reply,
                Err(_) => {
                    tracing::warn!(
                        tool = request.tool_name(),
                        "no confirmation within {}s, denying",
                        limit.as_secs()
                    );
                    self.hooks.emit(GateEvent::ConfirmationTimedOut {
                        request_id: request.id(),
                        tool_name: request.tool_name().to_string(),
                        waited: limit,
                    });
                    None
                }
            },
            None => self.prompter.ask(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{EventCollector, ScriptedPrompter};
    use crate::tool::{FnBody, Sensitivity};
    use std::time::Duration;

    fn sensitive(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, FnBody::new(|_| Ok("ok".into())))
    }

    fn gate(prompter: Arc<ScriptedPrompter>) -> ConfirmationGate {
        ConfirmationGate::new(ConfirmationPolicy::default(), prompter)
    }

    #[tokio::test]
    async fn test_routine_tool_never_prompts() {
        let prompter = Arc::new(ScriptedPrompter::replying(["n"]));
        let gate = gate(prompter.clone());
        let tool = sensitive("ListLabels").with_sensitivity(Sensitivity::Routine);

        let verdict = gate.request_approval(&tool, &serde_json::json!({})).await;

        assert_eq!(verdict, Verdict::Approved);
        assert_eq!(prompter.ask_count(), 0);
    }

    #[tokio::test]
    async fn test_replies_map_to_verdicts() {
        let cases = [
            (Some("y"), Verdict::Approved),
            (Some(" YES "), Verdict::Approved),
            (Some("n"), Verdict::Denied),
            (Some(""), Verdict::Denied),
            (Some("maybe"), Verdict::Denied),
            (None, Verdict::Denied),
        ];

        for (reply, expected) in cases {
            let prompter = Arc::new(ScriptedPrompter::new([reply.map(str::to_string)]));
            let gate = gate(prompter.clone());
            let verdict = gate
                .request_approval(&sensitive("SearchNews"), &serde_json::json!({"q": "x"}))
                .await;
            assert_eq!(verdict, expected, "reply {:?}", reply);
            assert_eq!(prompter.ask_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_prompter_sees_tool_and_arguments() {
        let prompter = Arc::new(ScriptedPrompter::replying(["y"]));
        let gate = gate(prompter.clone());
        let args = serde_json::json!({"keywords": "rust"});

        gate.request_approval(&sensitive("SearchNews"), &args).await;

        let asked = prompter.asked();
        assert_eq!(asked.len(), 1);
        assert_eq!(asked[0].tool_name(), "SearchNews");
        assert_eq!(asked[0].arguments(), &args);
        assert_eq!(asked[0].verdict(), Verdict::Pending);
    }

    #[tokio::test]
    async fn test_events_bracket_the_prompt() {
        let hooks = Hooks::new();
        let events = EventCollector::new();
        hooks.add(events.clone());
        let gate = ConfirmationGate::with_hooks(
            ConfirmationPolicy::default(),
            Arc::new(ScriptedPrompter::replying(["n"])),
            hooks,
        );

        gate.request_approval(&sensitive("SearchNews"), &serde_json::json!({}))
            .await;

        let names = events.names();
        assert_eq!(names, vec!["ConfirmationRequested", "ConfirmationResolved"]);
        match events.events().last() {
            Some(GateEvent::ConfirmationResolved { verdict, .. }) => {
                assert_eq!(*verdict, Verdict::Denied)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_denies() {
        let prompter = Arc::new(ScriptedPrompter::hanging());
        let policy = ConfirmationPolicy::default().with_timeout(Duration::from_secs(30));
        let events = EventCollector::new();
        let hooks = Hooks::new();
        hooks.add(events.clone());
        let gate = ConfirmationGate::with_hooks(policy, prompter.clone(), hooks);

        let verdict = gate
            .request_approval(&sensitive("SearchNews"), &serde_json::json!({}))
            .await;

        assert_eq!(verdict, Verdict::Denied);
        assert_eq!(prompter.ask_count(), 1);
        assert_eq!(
            events.names(),
            vec!["ConfirmationRequested", "ConfirmationTimedOut", "ConfirmationResolved"]
        );
    }

    #[tokio::test]
    async fn test_cancellation_denies() {
        let gate = gate(Arc::new(ScriptedPrompter::hanging()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let verdict = gate
            .request_approval_with_cancel(&sensitive("SearchNews"), &serde_json::json!({}), &cancel)
            .await;
        assert_eq!(verdict, Verdict::Denied);
    }

    #[tokio::test]
    async fn test_same_tool_prompts_are_serialized() {
        let prompter = Arc::new(
            ScriptedPrompter::replying(["y", "n"]).with_delay(Duration::from_millis(30)),
        );
        let gate = Arc::new(gate(prompter.clone()));
        let tool = Arc::new(sensitive("SearchNews"));

        let spawn = |gate: Arc<ConfirmationGate>, tool: Arc<ToolDescriptor>| {
            tokio::spawn(async move { gate.request_approval(&tool, &serde_json::json!({})).await })
        };
        let first = spawn(gate.clone(), tool.clone());
        let second = spawn(gate.clone(), tool.clone());

        let mut verdicts = vec![first.await.unwrap(), second.await.unwrap()];
        verdicts.sort_by_key(|v| v.is_approved());
        assert_eq!(verdicts, vec![Verdict::Denied, Verdict::Approved]);
        assert_eq!(prompter.ask_count(), 2);
        assert_eq!(prompter.max_concurrent(), 1);
    }
}
