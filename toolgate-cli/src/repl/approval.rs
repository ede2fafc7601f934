//! Confirmation prompts on the terminal
//!
//! The operator sees the tool and its arguments and answers y/n. Anything
//! other than `y` or `yes` (any case) is a denial, and so are Ctrl-C and
//! closed input.

use super::console::{ConsoleHandle, ReadOutcome};
use async_trait::async_trait;
use toolgate_core::{is_affirmative, ConfirmationPrompter, ConfirmationRequest};

const REPLY_PROMPT: &str = "Run it? [y/N]: ";

/// Asks the operator through the console's input
#[derive(Clone)]
pub struct TerminalPrompter {
    input: ConsoleHandle,
}

impl TerminalPrompter {
    pub fn new(input: ConsoleHandle) -> Self {
        Self { input }
    }
}

#[async_trait]
impl ConfirmationPrompter for TerminalPrompter {
    async fn ask(&self, request: &ConfirmationRequest) -> Option<String> {
        println!("{}\n", render_request(request));

        let reply = match self.input.read_reply(REPLY_PROMPT).await {
            ReadOutcome::Line(line) => Some(line),
            ReadOutcome::Interrupted | ReadOutcome::Eof => None,
        };
        match reply.as_deref() {
            Some(reply) if is_affirmative(reply) => print_confirmation("Approved"),
            Some(_) => println!("  \x1b[31m✗\x1b[0m Denied"),
            None => println!(),
        }
        reply
    }
}

/// The confirmation block shown to the operator
pub fn render_request(request: &ConfirmationRequest) -> String {
    let mut out = String::from("\n\x1b[33mConfirmation required:\x1b[0m");
    for (i, line) in request.summary().lines().enumerate() {
        if i == 0 {
            out.push_str(&format!("\n🛠️  \x1b[1m{}\x1b[0m", line));
        } else {
            out.push_str(&format!("\n  {}", line));
        }
    }
    out
}

/// Print a confirmation message
pub fn print_confirmation(message: &str) {
    println!("  \x1b[32m✓\x1b[0m {}", message);
}
