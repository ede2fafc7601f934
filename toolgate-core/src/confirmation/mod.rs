//! Point-of-use confirmation
//!
//! A sensitive tool only runs after a human has said yes to this particular
//! call. Verdicts are never cached: the next call of the same tool asks
//! again.
//!
//! - [`ConfirmationPolicy`] decides which tools need a verdict
//! - [`ConfirmationPrompter`] is how the question reaches a human
//! - [`ConfirmationGate`] ties the two together and serializes prompts
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use toolgate_core::{
//!     AutoDeny, ConfirmationGate, ConfirmationPolicy, FnBody, Sensitivity, ToolDescriptor,
//!     Verdict,
//! };
//!
//! # tokio_test::block_on(async {
//! // Without an operator attached, every prompt is denied
//! let gate = ConfirmationGate::new(ConfirmationPolicy::default(), Arc::new(AutoDeny));
//!
//! let lookup = ToolDescriptor::new("Lookup", FnBody::new(|_| Ok("ok".into())))
//!     .with_sensitivity(Sensitivity::Routine);
//! let send = ToolDescriptor::new("SendEmail", FnBody::new(|_| Ok("sent".into())));
//!
//! let args = serde_json::json!({"to": "someone@example.com"});
//! assert_eq!(gate.request_approval(&lookup, &args).await, Verdict::Approved);
//! assert_eq!(gate.request_approval(&send, &args).await, Verdict::Denied);
//! # });
//! ```

mod gate;
mod request;

pub use gate::ConfirmationGate;
pub use request::ConfirmationRequest;

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::whole_secs_rounded_up;
use crate::tool::{Sensitivity, ToolDescriptor};

/// State of a confirmation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pending,
    Approved,
    Denied,
}

impl Verdict {
    pub fn is_approved(self) -> bool {
        matches!(self, Verdict::Approved)
    }
}

/// Which tools need a human verdict before they run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfirmationPolicy {
    /// When set, exactly these tools require confirmation. When unset, every
    /// `Sensitive` tool does.
    pub enforce_for: Option<BTreeSet<String>>,
    /// Tools that never prompt, whatever the rules above say
    pub exempt: BTreeSet<String>,
    /// Give up on a verdict after this many seconds (counts as a denial)
    pub timeout_secs: Option<u64>,
}

impl ConfirmationPolicy {
    /// Confirm exactly the named tools
    pub fn enforce_for<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enforce_for: Some(names.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn with_exempt(mut self, name: impl Into<String>) -> Self {
        self.exempt.insert(name.into());
        self
    }

    /// Rounded up to whole seconds, so a sub-second timeout is one second
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(whole_secs_rounded_up(timeout));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Pure function of the tool and this policy
    pub fn requires_confirmation(&self, tool: &ToolDescriptor) -> bool {
        if self.exempt.contains(tool.name()) {
            return false;
        }
        match &self.enforce_for {
            Some(names) => names.contains(tool.name()),
            None => tool.sensitivity() == Sensitivity::Sensitive,
        }
    }
}

/// Returns true only for an explicit yes
///
/// `y` and `yes` in any case, surrounding whitespace ignored. Everything
/// else, including an empty line, is a no.
pub fn is_affirmative(reply: &str) -> bool {
    let reply = reply.trim();
    reply.eq_ignore_ascii_case("y") || reply.eq_ignore_ascii_case("yes")
}

/// Delivers a confirmation request to a human and returns their raw reply
///
/// Return `None` when no reply can be obtained (closed input, interrupted
/// prompt). The gate treats that as a denial.
#[async_trait]
pub trait ConfirmationPrompter: Send + Sync {
    async fn ask(&self, request: &ConfirmationRequest) -> Option<String>;
}

/// Prompter for non-interactive runs: never replies, so every request is
/// denied
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDeny;

#[async_trait]
impl ConfirmationPrompter for AutoDeny {
    async fn ask(&self, request: &ConfirmationRequest) -> Option<String> {
        tracing::debug!(tool = request.tool_name(), "no operator attached, denying");
        None
    }
}
