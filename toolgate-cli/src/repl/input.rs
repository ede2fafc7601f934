//! Parsing console lines into tool calls
//!
//! A tool call is the tool's catalog name, optionally followed by a JSON
//! object with its arguments:
//!
//! ```text
//! GoogleNews_SearchNewsStories {"keywords": "rust"}
//! GoogleNews_TrendingTopics
//! ```

use serde_json::Value;
use thiserror::Error;
use toolgate_core::ToolCall;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("expected a tool name")]
    MissingName,

    #[error("arguments are not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Parse `Name {json}` into a [`ToolCall`] with the given id
///
/// Missing arguments become an empty object. Arguments that parse but are
/// not an object are passed through; the runtime rejects them.
pub fn parse_tool_call(line: &str, call_id: impl Into<String>) -> Result<ToolCall, InputError> {
    let line = line.trim();
    let (name, rest) = match line.find(char::is_whitespace) {
        Some(split) => (&line[..split], line[split..].trim()),
        None => (line, ""),
    };
    if name.is_empty() {
        return Err(InputError::MissingName);
    }

    let arguments = if rest.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(rest)?
    };
    Ok(ToolCall::new(call_id, name, arguments))
}
