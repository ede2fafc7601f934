use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a (user, tool) pair stands in the grant flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Unauthorized,
    PendingGrant,
    Authorized,
}

/// Snapshot of the grant state for one (user, tool) pair
///
/// Records are created on the first authorization attempt and only the
/// [`AuthorizationStore`](super::AuthorizationStore) changes them. Once
/// `Authorized`, a record stays that way for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub status: AuthorizationStatus,
    /// Where the user completes the grant; set only while `PendingGrant`
    pub grant_challenge_url: Option<String>,
    /// Why the provider refused the grant, if it did
    pub refusal: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AuthorizationRecord {
    pub(crate) fn new() -> Self {
        Self {
            status: AuthorizationStatus::Unauthorized,
            grant_challenge_url: None,
            refusal: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.status == AuthorizationStatus::Authorized
    }

    pub(crate) fn pending(&mut self, url: Option<String>) {
        self.status = AuthorizationStatus::PendingGrant;
        self.grant_challenge_url = url;
        self.touch();
    }

    pub(crate) fn authorized(&mut self) {
        self.status = AuthorizationStatus::Authorized;
        self.grant_challenge_url = None;
        self.refusal = None;
        self.touch();
    }

    pub(crate) fn unauthorized(&mut self) {
        self.status = AuthorizationStatus::Unauthorized;
        self.grant_challenge_url = None;
        self.touch();
    }

    pub(crate) fn refused(&mut self, reason: String) {
        self.unauthorized();
        self.refusal = Some(reason);
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
