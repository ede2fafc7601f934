use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::confirmation::Verdict;
use crate::tool::ToolResult;
use crate::types::UserId;

/// Events emitted while the gateway handles a tool call
///
/// Hooks are the gateway's output channel: the grant URL, the confirmation
/// summary and the fate of every call reach the operator through them.
#[derive(Debug, Clone)]
pub enum GateEvent {
    // ===== Dispatch =====
    /// The runtime received a tool call (fires exactly once per call)
    ToolRequested {
        call_id: String,
        name: String,
        arguments: Value,
    },

    // ===== Authorization =====
    /// The user must visit `url` to grant access to the tool
    AuthorizationRequired {
        user: UserId,
        tool_name: String,
        url: String,
    },

    /// A grant now exists for the (user, tool) pair
    AuthorizationGranted { user: UserId, tool_name: String },

    /// Acquiring a grant failed (refused, timed out, cancelled or provider error)
    AuthorizationFailed {
        user: UserId,
        tool_name: String,
        reason: String,
    },

    // ===== Confirmation =====
    /// A human verdict is needed before the tool runs
    ConfirmationRequested {
        request_id: Uuid,
        tool_name: String,
        arguments: Value,
        /// Human-readable rendering of the call
        summary: String,
    },

    /// Nobody answered the prompt in time; a denial follows
    ConfirmationTimedOut {
        request_id: Uuid,
        tool_name: String,
        waited: Duration,
    },

    /// The verdict for a confirmation request is in
    ConfirmationResolved {
        request_id: Uuid,
        tool_name: String,
        verdict: Verdict,
    },

    // ===== Execution =====
    /// The tool body is about to run
    ToolExecuting { name: String },

    /// The tool body returned a result
    ToolCompleted {
        name: String,
        output: ToolResult,
        duration: Duration,
    },

    /// The tool body returned an error
    ToolFailed {
        name: String,
        error: String,
        duration: Duration,
    },

    /// The call ended without a result from the tool
    ToolNotExecuted {
        call_id: String,
        name: String,
        reason: String,
    },
}

/// Hook for observing gateway events
///
/// # Example
/// ```
/// use toolgate_core::events::{GateEvent, GateHook};
///
/// struct Printer;
///
/// impl GateHook for Printer {
///     fn on_event(&self, event: &GateEvent) {
///         if let GateEvent::AuthorizationRequired { url, .. } = event {
///             println!("Authorize here: {}", url);
///         }
///     }
/// }
/// ```
pub trait GateHook: Send + Sync {
    /// Called when an event occurs
    fn on_event(&self, event: &GateEvent);
}

/// Blanket implementation for closures
impl<F> GateHook for F
where
    F: Fn(&GateEvent) + Send + Sync,
{
    fn on_event(&self, event: &GateEvent) {
        self(event)
    }
}

/// Unique identifier for a registered hook.
///
/// Used to remove hooks via [`Hooks::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(pub(crate) u64);

/// Shared registry of hooks
///
/// Cloning is cheap and every clone sees the same registrations, so the
/// store, the gate, the interceptor and the runtime all emit to one set of
/// observers. Hooks fire in registration order.
#[derive(Clone, Default)]
pub struct Hooks {
    inner: Arc<RwLock<BTreeMap<HookId, Arc<dyn GateHook>>>>,
    next_id: Arc<AtomicU64>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, returning an id that can remove it later
    pub fn add(&self, hook: impl GateHook + 'static) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.write().insert(id, Arc::new(hook));
        id
    }

    /// Returns `true` if the hook was registered
    pub fn remove(&self, id: HookId) -> bool {
        self.inner.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Emit an event to all registered hooks
    pub fn emit(&self, event: GateEvent) {
        // Snapshot so a hook may register or remove hooks while handling
        let hooks: Vec<_> = self.inner.read().values().cloned().collect();
        for hook in hooks {
            hook.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_closure_hooks_fire_in_order() {
        let hooks = Hooks::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        hooks.add(move |_: &GateEvent| first.lock().push("first"));
        let second = seen.clone();
        hooks.add(move |_: &GateEvent| second.lock().push("second"));

        hooks.emit(GateEvent::ToolExecuting {
            name: "SearchNews".into(),
        });

        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_remove_hook() {
        let hooks = Hooks::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let id = hooks.add(move |_: &GateEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hooks.len(), 1);
        assert!(hooks.remove(id));
        assert!(!hooks.remove(id));
        assert!(hooks.is_empty());

        hooks.emit(GateEvent::ToolExecuting { name: "x".into() });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clones_share_registrations() {
        let hooks = Hooks::new();
        let clone = hooks.clone();
        clone.add(|_: &GateEvent| {});
        assert_eq!(hooks.len(), 1);
    }
}
