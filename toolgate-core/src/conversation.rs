use serde::{Deserialize, Serialize};

use crate::runner::{NotExecuted, NotExecutedReason, ToolCallOutcome};

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Message history of one run
///
/// Besides plain appends, the history knows how to fold a call that did not
/// run back into the conversation so the next turn starts from a consistent
/// state instead of a dangling tool call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Record the outcome of a dispatched call
    pub fn record(&mut self, outcome: &ToolCallOutcome) {
        match outcome {
            ToolCallOutcome::Completed {
                tool_name, result, ..
            } => self.push_assistant(format!("{} returned: {}", tool_name, result.as_text())),
            ToolCallOutcome::Failed {
                tool_name, error, ..
            } => self.push_assistant(format!("{} failed: {}", tool_name, error)),
            ToolCallOutcome::NotExecuted(not_executed) => self.recover_from(not_executed),
        }
    }

    /// Fold a call that did not run into the history
    ///
    /// A user denial becomes the exchange the user would have had with a
    /// model that asked first:
    ///
    /// ```text
    /// assistant: Please confirm the call to SearchNews
    /// user:      I changed my mind, please don't do it!
    /// assistant: Sure, I cancelled the call to SearchNews. What else can I do for you today?
    /// ```
    ///
    /// Any other reason appends one assistant message saying why.
    pub fn recover_from(&mut self, not_executed: &NotExecuted) {
        let tool = &not_executed.tool_name;
        match &not_executed.reason {
            NotExecutedReason::Denied(_) => {
                self.push_assistant(format!("Please confirm the call to {}", tool));
                self.push_user("I changed my mind, please don't do it!");
                self.push_assistant(format!(
                    "Sure, I cancelled the call to {}. What else can I do for you today?",
                    tool
                ));
            }
            reason => self.push_assistant(format!(
                "I could not run {} because {}. What else can I do for you today?",
                tool, reason
            )),
        }
    }
}
