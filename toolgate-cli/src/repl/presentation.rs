//! Gateway event presentation for CLI output

use super::commands::Verbosity;
use std::sync::{Arc, Mutex};
use toolgate_core::{GateEvent, GateHook, ToolResult, Verdict};

/// Longest tool output shown at normal verbosity
const MAX_OUTPUT_LINES: usize = 12;

/// Hook that prints gateway events as they happen
///
/// Grant URLs must reach the user while the gateway is still waiting for the
/// grant, so events are printed immediately rather than after the call.
pub struct PresentationHook {
    verbosity: Arc<Mutex<Verbosity>>,
}

impl PresentationHook {
    pub fn new(verbosity: Arc<Mutex<Verbosity>>) -> Self {
        Self { verbosity }
    }
}

impl GateHook for PresentationHook {
    fn on_event(&self, event: &GateEvent) {
        let verbosity = self
            .verbosity
            .lock()
            .map(|v| *v)
            .unwrap_or(Verbosity::Normal);
        if let Some(text) = format_event(event, verbosity) {
            println!("{}", text);
        }
    }
}

/// Terminal rendering of an event, if it is shown at this verbosity
pub fn format_event(event: &GateEvent, verbosity: Verbosity) -> Option<String> {
    match event {
        GateEvent::AuthorizationRequired { tool_name, url, .. } => Some(format!(
            "\n🔑 \x1b[1m{}\x1b[0m needs your permission. Visit this URL to grant it:\n   {}\n   \x1b[2mwaiting for the grant...\x1b[0m",
            tool_name, url
        )),
        GateEvent::AuthorizationGranted { tool_name, .. } => {
            (verbosity != Verbosity::Quiet).then(|| format!("  \x1b[32m✓\x1b[0m {} authorized", tool_name))
        }
        GateEvent::AuthorizationFailed {
            tool_name, reason, ..
        } => Some(format!(
            "  \x1b[31m✗\x1b[0m {} not authorized: {}",
            tool_name, reason
        )),
        GateEvent::ConfirmationTimedOut { waited, .. } => Some(format!(
            "\n  \x1b[31m✗\x1b[0m Denied (timed out after {}s)",
            waited.as_secs()
        )),
        GateEvent::ConfirmationResolved {
            tool_name,
            verdict: Verdict::Denied,
            ..
        } => (verbosity == Verbosity::Verbose)
            .then(|| format!("  \x1b[2m{} declined\x1b[0m", tool_name)),
        GateEvent::ToolExecuting { name } => {
            (verbosity == Verbosity::Verbose).then(|| format!("\x1b[2m⋯ running {}\x1b[0m", name))
        }
        GateEvent::ToolCompleted {
            name,
            output,
            duration,
        } => {
            if verbosity == Verbosity::Quiet {
                return Some(format!("┌─ {} \x1b[32m✓\x1b[0m", name));
            }
            let mut text = format!(
                "┌─ {} \x1b[2m({} ms)\x1b[0m",
                name,
                duration.as_millis()
            );
            for line in output_lines(output, verbosity) {
                text.push_str("\n│  ");
                text.push_str(&line);
            }
            text.push_str("\n└─");
            Some(text)
        }
        GateEvent::ToolFailed { name, error, .. } => Some(format!(
            "┌─ {}\n│  \x1b[31m{}\x1b[0m\n└─",
            name, error
        )),
        _ => None,
    }
}

fn output_lines(output: &ToolResult, verbosity: Verbosity) -> Vec<String> {
    let rendered = match output {
        ToolResult::Text(text) => text.clone(),
        ToolResult::Json(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    };
    if rendered.trim().is_empty() {
        return vec!["\x1b[2m(no output)\x1b[0m".to_string()];
    }

    let lines: Vec<String> = rendered.lines().map(str::to_string).collect();
    if verbosity == Verbosity::Verbose || lines.len() <= MAX_OUTPUT_LINES {
        return lines;
    }
    let hidden = lines.len() - MAX_OUTPUT_LINES;
    let mut shown = lines[..MAX_OUTPUT_LINES].to_vec();
    shown.push(format!("\x1b[2m… {} more lines\x1b[0m", hidden));
    shown
}
