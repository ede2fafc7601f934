//! Common test utilities shared across test files.
//!
//! This module provides mock implementations and test helpers.
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use toolgate_core::{
    ConfirmationPrompter, ConfirmationRequest, GateEvent, GateHook, GatewayConfig, GrantChallenge,
    GrantStatus, ProviderError, Sensitivity, ToolError, ToolProvider, ToolQuery, ToolResult,
    ToolSpec, UserId,
};

// ===== Tool Provider =====

/// A news-flavoured tool spec that requires a grant
pub fn spec(name: &str, sensitivity: Option<Sensitivity>) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        provider_name: format!("GoogleNews.{}", name),
        description: format!("{} (test)", name),
        toolkit: Some("GoogleNews".to_string()),
        requires_authorization: true,
        input_schema: serde_json::json!({"type": "object"}),
        sensitivity,
    }
}

/// How the provider answers grant requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grants {
    /// Every challenge is already complete
    Granted,
    /// Challenges complete after this many pending polls
    AfterPolls(usize),
    /// Challenges never complete
    Never,
}

/// Provider that records every call it receives
pub struct RecordingProvider {
    tools: Vec<ToolSpec>,
    grants: Grants,
    pending_polls: Mutex<usize>,
    starts: Mutex<Vec<(UserId, String)>>,
    polls: AtomicUsize,
    executions: Mutex<Vec<(String, Value)>>,
}

impl RecordingProvider {
    pub fn new(tools: Vec<ToolSpec>, grants: Grants) -> Self {
        Self {
            tools,
            grants,
            pending_polls: Mutex::new(0),
            starts: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
            executions: Mutex::new(Vec::new()),
        }
    }

    pub fn starts(&self) -> Vec<(UserId, String)> {
        self.starts.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Executions by provider name
    pub fn executions(&self) -> Vec<(String, Value)> {
        self.executions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn list_tools(&self, _query: &ToolQuery) -> Result<Vec<ToolSpec>, ProviderError> {
        Ok(self.tools.clone())
    }

    async fn start_authorization(
        &self,
        user: &UserId,
        tool_name: &str,
    ) -> Result<GrantChallenge, ProviderError> {
        self.starts
            .lock()
            .unwrap()
            .push((user.clone(), tool_name.to_string()));

        let status = match self.grants {
            Grants::Granted => GrantStatus::Complete,
            Grants::AfterPolls(n) => {
                *self.pending_polls.lock().unwrap() = n;
                GrantStatus::Pending
            }
            Grants::Never => GrantStatus::Pending,
        };
        Ok(GrantChallenge {
            id: Some(format!("grant-{}", tool_name)),
            tool_name: tool_name.to_string(),
            url: Some(format!("https://auth.example.com/{}", tool_name)),
            status,
        })
    }

    async fn poll_authorization_status(
        &self,
        _user: &UserId,
        _challenge: &GrantChallenge,
    ) -> Result<GrantStatus, ProviderError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.grants == Grants::Never {
            return Ok(GrantStatus::Pending);
        }
        let mut remaining = self.pending_polls.lock().unwrap();
        if *remaining == 0 {
            Ok(GrantStatus::Complete)
        } else {
            *remaining -= 1;
            Ok(GrantStatus::Pending)
        }
    }

    async fn invoke_tool_body(
        &self,
        _user: &UserId,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolResult, ToolError> {
        self.executions
            .lock()
            .unwrap()
            .push((tool_name.to_string(), arguments));
        Ok(ToolResult::text(format!("{} ran", tool_name)))
    }
}

// ===== Prompter =====

/// Answers confirmation prompts from a fixed list of replies
///
/// Once the list runs out every prompt goes unanswered.
pub struct Operator {
    replies: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl Operator {
    pub fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// An operator who never answers
    pub fn silent() -> Self {
        Self::replying(std::iter::empty())
    }

    /// Tool names the operator was asked about, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmationPrompter for Operator {
    async fn ask(&self, request: &ConfirmationRequest) -> Option<String> {
        self.asked
            .lock()
            .unwrap()
            .push(request.tool_name().to_string());
        self.replies.lock().unwrap().pop_front()
    }
}

// ===== Event Log =====

/// Records a short label for each gateway event
#[derive(Clone, Default)]
pub struct EventLog {
    labels: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.labels()
            .iter()
            .filter(|label| label.starts_with(prefix))
            .count()
    }
}

impl GateHook for EventLog {
    fn on_event(&self, event: &GateEvent) {
        let label = match event {
            GateEvent::ToolRequested { name, .. } => format!("requested:{}", name),
            GateEvent::AuthorizationRequired { tool_name, .. } => {
                format!("auth_required:{}", tool_name)
            }
            GateEvent::AuthorizationGranted { tool_name, .. } => {
                format!("auth_granted:{}", tool_name)
            }
            GateEvent::AuthorizationFailed { tool_name, .. } => {
                format!("auth_failed:{}", tool_name)
            }
            GateEvent::ConfirmationRequested { tool_name, .. } => {
                format!("confirm:{}", tool_name)
            }
            GateEvent::ConfirmationTimedOut { tool_name, .. } => {
                format!("confirm_timeout:{}", tool_name)
            }
            GateEvent::ConfirmationResolved {
                tool_name, verdict, ..
            } => format!("verdict:{}:{:?}", tool_name, verdict),
            GateEvent::ToolExecuting { name } => format!("executing:{}", name),
            GateEvent::ToolCompleted { name, .. } => format!("completed:{}", name),
            GateEvent::ToolFailed { name, .. } => format!("failed:{}", name),
            GateEvent::ToolNotExecuted { name, .. } => format!("not_executed:{}", name),
        };
        self.labels.lock().unwrap().push(label);
    }
}

// ===== Configuration =====

/// Configuration for user `u1` with the given grant poll timings
pub fn config(poll_interval_ms: u64, max_wait_secs: u64) -> GatewayConfig {
    let mut config = GatewayConfig {
        user_id: Some("u1".to_string()),
        ..Default::default()
    };
    config.authorization.poll_interval_ms = poll_interval_ms;
    config.authorization.max_wait_secs = max_wait_secs;
    config
}
