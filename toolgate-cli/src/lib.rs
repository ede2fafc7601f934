//! Terminal front end for toolgate
//!
//! This crate provides:
//! - A confirmation prompter that asks the operator on the terminal
//! - A presentation hook that prints grant URLs and tool results
//! - An interactive console that dispatches tool calls through the gateway
//!   and owns the only reader of terminal input

mod error;
pub mod repl;

pub use error::CliError;
pub use repl::{
    default_history_path, format_event, parse_tool_call, print_confirmation, render_request,
    run_cli, Console, ConsoleHandle, EditorSource, InputError, LineSource, PresentationHook,
    ReadOutcome, TerminalPrompter, Verbosity,
};
