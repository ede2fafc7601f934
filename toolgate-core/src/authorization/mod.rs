//! Per-user tool authorization
//!
//! Before a tool that needs a grant can run, the user must complete an
//! OAuth-style flow with the provider. The [`AuthorizationStore`] drives that
//! flow once per (user, tool) pair and remembers the outcome for the rest of
//! the run.

mod record;
mod store;

pub use record::{AuthorizationRecord, AuthorizationStatus};
pub use store::AuthorizationStore;
