use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::Verdict;
use crate::tool::ToolDescriptor;

/// One pending question to the operator, for one invocation attempt
///
/// Requests are created by the gate right before a sensitive tool would run
/// and dropped once their verdict is recorded. Prompters only ever see a
/// shared reference.
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    id: Uuid,
    tool_name: String,
    arguments: Value,
    verdict: Verdict,
    created_at: DateTime<Utc>,
}

impl ConfirmationRequest {
    pub fn new(tool: &ToolDescriptor, arguments: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_name: tool.name().to_string(),
            arguments,
            verdict: Verdict::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn resolve(&mut self, verdict: Verdict) {
        self.verdict = verdict;
    }

    /// Human-readable rendering of the call
    ///
    /// ```text
    /// GoogleNews_SearchNewsStories
    ///   keywords: "rust"
    ///   limit: 5
    /// ```
    pub fn summary(&self) -> String {
        let mut out = self.tool_name.clone();
        match &self.arguments {
            Value::Object(map) if map.is_empty() => out.push_str(" (no arguments)"),
            Value::Object(map) => {
                for (key, value) in map {
                    out.push_str(&format!("\n  {}: {}", key, value));
                }
            }
            other => out.push_str(&format!("\n  {}", other)),
        }
        out
    }
}
