//! Interactive console for the toolgate gateway

mod approval;
mod commands;
mod console;
mod input;
mod presentation;

use crate::error::CliError;
use commands::{handle_special_command, SpecialCommandResult};
use std::sync::{Arc, Mutex};
use toolgate_core::{Conversation, Gateway, ToolCall, ToolCallOutcome, ToolRuntime};

pub use approval::{print_confirmation, render_request, TerminalPrompter};
pub use console::{
    default_history_path, Console, ConsoleHandle, EditorSource, LineSource, ReadOutcome,
};
pub use commands::{render_authorizations, render_history, render_tools, Verbosity};
pub use input::{parse_tool_call, InputError};
pub use presentation::{format_event, PresentationHook};

const PROMPT: &str = "toolgate> ";

/// Run an interactive console for the gateway
///
/// Each line is either a command (`/help`, `/tools`, `/history`, `/auth`,
/// `exit`) or a tool call `ToolName {json}` dispatched through the gateway's
/// runtime, exactly as a planner would. A call that does not run is folded
/// back into the conversation and the console carries on. Ctrl-C while a
/// call waits for a grant or a confirmation abandons that call only.
///
/// The console must be the one the gateway's [`TerminalPrompter`] reads
/// through, so commands and confirmation replies share one reader.
///
/// # Errors
///
/// Returns `CliError` which can be:
/// - `Readline` - Input/readline errors
/// - `Io` - Filesystem errors (history saving)
///
/// # Example
/// ```ignore
/// use toolgate_cli::{default_history_path, run_cli, Console, TerminalPrompter};
/// use toolgate_core::{ArcadeProvider, Gateway};
///
/// let console = Console::open(default_history_path())?;
/// let gateway = Gateway::builder()
///     .provider(ArcadeProvider::from_env()?)
///     .prompter(TerminalPrompter::new(console.handle()))
///     .user("me@example.com")
///     .build()
///     .await?;
///
/// run_cli(gateway, console).await?;
/// ```
pub async fn run_cli(gateway: Gateway, console: Console) -> Result<(), CliError> {
    let verbosity = Arc::new(Mutex::new(Verbosity::Normal));
    let hook_id = gateway.add_hook(PresentationHook::new(Arc::clone(&verbosity)));
    print_welcome(&gateway);

    let input = console.handle();
    let runtime = gateway.runtime();
    let mut conversation = Conversation::new();
    let mut calls = 0usize;

    loop {
        match input.read_command(PROMPT).await {
            ReadOutcome::Line(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                if let Some(result) =
                    handle_special_command(line, &gateway, &conversation, &verbosity)
                {
                    match result {
                        SpecialCommandResult::Exit => break,
                        SpecialCommandResult::Continue => continue,
                    }
                }

                calls += 1;
                let call = match parse_tool_call(line, format!("call_{}", calls)) {
                    Ok(call) => call,
                    Err(e) => {
                        eprintln!("❌ {}. Type /help for the call syntax.\n", e);
                        continue;
                    }
                };

                conversation.push_user(line);
                let outcome = dispatch_interruptible(&runtime, call).await;
                conversation.record(&outcome);

                if let ToolCallOutcome::NotExecuted(_) = outcome {
                    // The recovery exchange ends with the assistant's reply
                    if let Some(reply) = conversation.messages().last() {
                        println!("\n{}\n", reply.content);
                    }
                } else {
                    println!();
                }
            }
            ReadOutcome::Interrupted => {
                // Ctrl+C - just continue
                println!("^C");
                continue;
            }
            ReadOutcome::Eof => {
                // Ctrl+D - exit
                break;
            }
        }
    }

    gateway.remove_hook(hook_id);
    console.close()?;

    println!("\n👋 Goodbye!\n");
    Ok(())
}

/// Dispatch one call; Ctrl-C abandons it and the console carries on
async fn dispatch_interruptible(runtime: &ToolRuntime, call: ToolCall) -> ToolCallOutcome {
    let cancel = runtime.call_token();
    let dispatch = runtime.dispatch_with_cancel(call, cancel.clone());
    tokio::pin!(dispatch);

    tokio::select! {
        outcome = &mut dispatch => outcome,
        Ok(()) = tokio::signal::ctrl_c() => {
            println!("^C");
            cancel.cancel();
            dispatch.await
        }
    }
}

fn print_welcome(gateway: &Gateway) {
    println!("\n\x1b[1mtoolgate\x1b[0m v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Acting for \x1b[1m{}\x1b[0m with {} tools loaded.",
        gateway.user(),
        gateway.catalog().len()
    );
    println!("Type /help for commands, /tools to list tools, exit to quit.\n");
}
