//! Test utilities for toolgate-core.
//!
//! Mock implementations of the gateway's collaborators so the authorization
//! and confirmation flows can be exercised without a real tool provider or a
//! human at the keyboard.
//!
//! Enable with the `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! toolgate-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use toolgate_core::test_utils::{tool_spec, MockToolProvider, ScriptedPrompter};
//! use toolgate_core::{Gateway, GrantStatus};
//!
//! # async fn example() -> toolgate_core::Result<()> {
//! let provider = MockToolProvider::new()
//!     .with_tool(tool_spec("SearchNews"))
//!     .with_polls([GrantStatus::Pending, GrantStatus::Complete]);
//!
//! let gateway = Gateway::builder()
//!     .provider(provider)
//!     .prompter(ScriptedPrompter::replying(["y"]))
//!     .user("u1")
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::confirmation::{ConfirmationPrompter, ConfirmationRequest};
use crate::events::{GateEvent, GateHook};
use crate::provider::{GrantChallenge, GrantStatus, ProviderError, ToolProvider, ToolQuery, ToolSpec};
use crate::tool::{ToolBody, ToolError, ToolResult};
use crate::types::UserId;

/// A tool spec in the `Mock` toolkit that needs a grant
pub fn tool_spec(name: &str) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        provider_name: name.to_string(),
        description: format!("Mock tool {}", name),
        toolkit: Some("Mock".to_string()),
        requires_authorization: true,
        input_schema: serde_json::json!({"type": "object", "properties": {}}),
        sensitivity: None,
    }
}

/// A mock tool provider.
///
/// `start_authorization` answers `Pending` with a URL of the form
/// `https://auth.example.com/grant/{tool}` unless [`already_granted`] is set.
/// Polls return the scripted statuses in order, then `Pending` forever.
/// Tool bodies echo their name and arguments back as JSON.
///
/// [`already_granted`]: MockToolProvider::already_granted
#[derive(Default)]
pub struct MockToolProvider {
    tools: Vec<ToolSpec>,
    granted: bool,
    without_url: bool,
    polls: Mutex<VecDeque<GrantStatus>>,
    list_error: Mutex<Option<ProviderError>>,
    start_error: Mutex<Option<ProviderError>>,
    invoke_error: Option<String>,
    invocations: Mutex<Vec<(String, Value)>>,
    list_calls: AtomicUsize,
    start_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl MockToolProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, spec: ToolSpec) -> Self {
        self.tools.push(spec);
        self
    }

    /// Statuses returned by successive polls
    pub fn with_polls(self, statuses: impl IntoIterator<Item = GrantStatus>) -> Self {
        self.polls.lock().extend(statuses);
        self
    }

    /// Challenges come back already complete
    pub fn already_granted(mut self) -> Self {
        self.granted = true;
        self
    }

    /// Pending challenges come back without a URL
    pub fn without_url(mut self) -> Self {
        self.without_url = true;
        self
    }

    /// The next `list_tools` fails with `err`
    pub fn failing_list(self, err: ProviderError) -> Self {
        *self.list_error.lock() = Some(err);
        self
    }

    /// The next `start_authorization` fails with `err`
    pub fn failing_start(self, err: ProviderError) -> Self {
        *self.start_error.lock() = Some(err);
        self
    }

    /// Every tool body fails with `message`
    pub fn failing_tools(mut self, message: impl Into<String>) -> Self {
        self.invoke_error = Some(message.into());
        self
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// (provider tool name, arguments) of every body invocation
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl ToolProvider for MockToolProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_tools(&self, _query: &ToolQuery) -> Result<Vec<ToolSpec>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.list_error.lock().take() {
            return Err(err);
        }
        Ok(self.tools.clone())
    }

    async fn start_authorization(
        &self,
        _user: &UserId,
        tool_name: &str,
    ) -> Result<GrantChallenge, ProviderError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.start_error.lock().take() {
            return Err(err);
        }

        let n = self.start_calls.load(Ordering::SeqCst);
        Ok(if self.granted {
            GrantChallenge {
                id: Some(format!("auth_{}", n)),
                tool_name: tool_name.to_string(),
                url: None,
                status: GrantStatus::Complete,
            }
        } else {
            GrantChallenge {
                id: Some(format!("auth_{}", n)),
                tool_name: tool_name.to_string(),
                url: (!self.without_url)
                    .then(|| format!("https://auth.example.com/grant/{}", tool_name)),
                status: GrantStatus::Pending,
            }
        })
    }

    async fn poll_authorization_status(
        &self,
        _user: &UserId,
        _challenge: &GrantChallenge,
    ) -> Result<GrantStatus, ProviderError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.polls.lock().pop_front().unwrap_or(GrantStatus::Pending))
    }

    async fn invoke_tool_body(
        &self,
        _user: &UserId,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolResult, ToolError> {
        self.invocations
            .lock()
            .push((tool_name.to_string(), arguments.clone()));
        match &self.invoke_error {
            Some(message) => Err(ToolError::Custom(message.clone())),
            None => Ok(ToolResult::Json(
                serde_json::json!({"tool": tool_name, "arguments": arguments}),
            )),
        }
    }
}

/// A prompter that replies from a script.
///
/// Replies are consumed in order; once the script is exhausted every request
/// gets no reply. A hanging prompter never replies at all, which is useful
/// for timeout and cancellation tests.
#[derive(Default)]
pub struct ScriptedPrompter {
    replies: Mutex<VecDeque<Option<String>>>,
    asked: Mutex<Vec<ConfirmationRequest>>,
    hang: bool,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedPrompter {
    pub fn new(replies: impl IntoIterator<Item = Option<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Reply with each string in turn
    pub fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(replies.into_iter().map(|r| Some(r.to_string())))
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    /// Wait this long before each reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn ask_count(&self) -> usize {
        self.asked.lock().len()
    }

    /// Every request the prompter was shown
    pub fn asked(&self) -> Vec<ConfirmationRequest> {
        self.asked.lock().clone()
    }

    /// Largest number of prompts that were open at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmationPrompter for ScriptedPrompter {
    async fn ask(&self, request: &ConfirmationRequest) -> Option<String> {
        self.asked.lock().push(request.clone());
        let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(open, Ordering::SeqCst);

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().pop_front().flatten();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

/// A tool body that counts its invocations and records their arguments
#[derive(Clone)]
pub struct CountingBody {
    result: Result<ToolResult, String>,
    calls: Arc<AtomicUsize>,
    arguments: Arc<Mutex<Vec<Value>>>,
}

impl CountingBody {
    pub fn returning(result: ToolResult) -> Self {
        Self {
            result: Ok(result),
            calls: Arc::new(AtomicUsize::new(0)),
            arguments: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            ..Self::returning(ToolResult::text(""))
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn arguments(&self) -> Vec<Value> {
        self.arguments.lock().clone()
    }
}

#[async_trait]
impl ToolBody for CountingBody {
    async fn invoke(&self, _user: &UserId, arguments: Value) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.arguments.lock().push(arguments);
        self.result.clone().map_err(ToolError::Custom)
    }
}

/// Event collector for testing hooks.
///
/// Collects all events emitted by the gateway for later inspection.
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<GateEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GateEvent> {
        self.events.lock().clone()
    }

    /// Variant names of the collected events, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(event_name).collect()
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.count_event(name) > 0
    }

    pub fn count_event(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| event_name(e) == name)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl GateHook for EventCollector {
    fn on_event(&self, event: &GateEvent) {
        self.events.lock().push(event.clone());
    }
}

fn event_name(event: &GateEvent) -> &'static str {
    match event {
        GateEvent::ToolRequested { .. } => "ToolRequested",
        GateEvent::AuthorizationRequired { .. } => "AuthorizationRequired",
        GateEvent::AuthorizationGranted { .. } => "AuthorizationGranted",
        GateEvent::AuthorizationFailed { .. } => "AuthorizationFailed",
        GateEvent::ConfirmationRequested { .. } => "ConfirmationRequested",
        GateEvent::ConfirmationTimedOut { .. } => "ConfirmationTimedOut",
        GateEvent::ConfirmationResolved { .. } => "ConfirmationResolved",
        GateEvent::ToolExecuting { .. } => "ToolExecuting",
        GateEvent::ToolCompleted { .. } => "ToolCompleted",
        GateEvent::ToolFailed { .. } => "ToolFailed",
        GateEvent::ToolNotExecuted { .. } => "ToolNotExecuted",
    }
}
