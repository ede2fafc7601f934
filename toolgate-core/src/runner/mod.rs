//! Binding the gateway to an agent runtime
//!
//! An agent runtime exposes one fixed injection point, [`PreToolCallHook`],
//! fired before any tool body runs. [`GatewayHook`] is the gateway's
//! implementation of it and [`ToolRuntime`] is the minimal dispatch stage
//! that honours the hook's [`ToolCallControl`].

mod hook;
mod runtime;

pub use hook::{
    GatewayHook, NotExecuted, NotExecutedReason, PreToolCallHook, RunContext, ToolCallControl,
};
pub use runtime::{ToolCall, ToolCallOutcome, ToolRuntime};
