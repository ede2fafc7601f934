use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::record::AuthorizationRecord;
use crate::config::GrantPollConfig;
use crate::error::GatewayError;
use crate::events::{GateEvent, Hooks};
use crate::locks::KeyedLocks;
use crate::provider::{GrantChallenge, GrantStatus, ProviderError, ToolProvider};
use crate::tool::ToolDescriptor;
use crate::types::UserId;

type PairKey = (UserId, String);

/// Stand-in deadline for a wait too long to represent as an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How the wait for a pending grant ended
enum GrantWait {
    Granted,
    Refused(String),
    TimedOut,
    Cancelled,
}

/// Per-user tool grants for the life of a run
///
/// The store is the only writer of [`AuthorizationRecord`]s. The record table
/// lock is never held across an `.await`; a per-pair async lock makes
/// concurrent attempts on the same (user, tool) pair share one challenge
/// while other pairs proceed independently.
pub struct AuthorizationStore {
    provider: Arc<dyn ToolProvider>,
    poll: GrantPollConfig,
    hooks: Hooks,
    records: RwLock<HashMap<PairKey, AuthorizationRecord>>,
    attempts: KeyedLocks<PairKey>,
}

impl AuthorizationStore {
    pub fn new(provider: Arc<dyn ToolProvider>, poll: GrantPollConfig) -> Self {
        Self::with_hooks(provider, poll, Hooks::new())
    }

    pub fn with_hooks(provider: Arc<dyn ToolProvider>, poll: GrantPollConfig, hooks: Hooks) -> Self {
        Self {
            provider,
            poll,
            hooks,
            records: RwLock::new(HashMap::new()),
            attempts: KeyedLocks::new(),
        }
    }

    pub fn poll_config(&self) -> GrantPollConfig {
        self.poll
    }

    /// Snapshot of the record for a pair, if an attempt was ever made
    pub fn record(&self, user: &UserId, tool_name: &str) -> Option<AuthorizationRecord> {
        self.records
            .read()
            .get(&(user.clone(), tool_name.to_string()))
            .cloned()
    }

    pub fn is_authorized(&self, user: &UserId, tool_name: &str) -> bool {
        self.record(user, tool_name)
            .is_some_and(|record| record.is_authorized())
    }

    /// All records, ordered by user then tool name
    pub fn records(&self) -> Vec<(UserId, String, AuthorizationRecord)> {
        let mut all: Vec<_> = self
            .records
            .read()
            .iter()
            .map(|((user, tool), record)| (user.clone(), tool.clone(), record.clone()))
            .collect();
        all.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        all
    }

    /// Make sure `user` holds a grant for `tool`, acquiring one if needed
    ///
    /// Returns immediately for an authorized pair and for tools that need no
    /// grant. Otherwise starts a challenge, publishes its URL as
    /// [`GateEvent::AuthorizationRequired`] and polls the provider until the
    /// grant completes, is refused, or the configured wait runs out.
    pub async fn ensure_authorized(
        &self,
        user: &UserId,
        tool: &ToolDescriptor,
    ) -> Result<(), GatewayError> {
        self.ensure_authorized_with_cancel(user, tool, &CancellationToken::new())
            .await
    }

    /// Like [`AuthorizationStore::ensure_authorized`], abandoning the wait
    /// when `cancel` fires
    pub async fn ensure_authorized_with_cancel(
        &self,
        user: &UserId,
        tool: &ToolDescriptor,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError> {
        if !tool.requires_authorization() {
            return Ok(());
        }

        let key = (user.clone(), tool.name().to_string());
        if let Some(settled) = self.settled(&key, tool) {
            return settled;
        }

        let _attempt = tokio::select! {
            guard = self.attempts.lock(key.clone()) => guard,
            _ = cancel.cancelled() => return Err(self.denied(user, tool, "authorization cancelled")),
        };

        // Whoever held the pair before us may have settled it
        if let Some(settled) = self.settled(&key, tool) {
            return settled;
        }

        self.acquire(&key, tool, cancel).await
    }

    fn settled(&self, key: &PairKey, tool: &ToolDescriptor) -> Option<Result<(), GatewayError>> {
        let records = self.records.read();
        let record = records.get(key)?;
        if record.is_authorized() {
            return Some(Ok(()));
        }
        record.refusal.as_ref().map(|reason| {
            Err(GatewayError::AuthorizationDenied {
                tool: tool.name().to_string(),
                user: key.0.clone(),
                reason: reason.clone(),
            })
        })
    }

    async fn acquire(
        &self,
        key: &PairKey,
        tool: &ToolDescriptor,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError> {
        let user = &key.0;
        self.update(key, |record| record.pending(None));
        tracing::debug!(user = %user, tool = tool.name(), "starting authorization");

        let started = tokio::select! {
            started = self.provider.start_authorization(user, tool.provider_name()) => started,
            _ = cancel.cancelled() => {
                self.update(key, AuthorizationRecord::unauthorized);
                return Err(self.denied(user, tool, "authorization cancelled"));
            }
        };
        let challenge = match started {
            Ok(challenge) => challenge,
            Err(err) => return Err(self.provider_failed(key, tool, err)),
        };

        match &challenge.status {
            GrantStatus::Complete => {
                self.grant(key, tool);
                return Ok(());
            }
            GrantStatus::Failed(reason) => return Err(self.refuse(key, tool, reason.clone())),
            GrantStatus::Pending => {}
        }

        let Some(url) = challenge.url.clone() else {
            let err = ProviderError::InvalidResponse(format!(
                "pending authorization for '{}' carries no URL",
                tool.provider_name()
            ));
            return Err(self.provider_failed(key, tool, err));
        };

        self.update(key, |record| record.pending(Some(url.clone())));
        tracing::info!(user = %user, tool = tool.name(), "authorization required");
        self.hooks.emit(GateEvent::AuthorizationRequired {
            user: user.clone(),
            tool_name: tool.name().to_string(),
            url,
        });

        match self.wait_for_grant(user, &challenge, cancel).await {
            Ok(GrantWait::Granted) => {
                self.grant(key, tool);
                Ok(())
            }
            Ok(GrantWait::Refused(reason)) => Err(self.refuse(key, tool, reason)),
            Ok(GrantWait::TimedOut) => {
                self.update(key, AuthorizationRecord::unauthorized);
                let err = GatewayError::AuthorizationTimeout {
                    tool: tool.name().to_string(),
                    user: user.clone(),
                    waited: self.poll.max_wait(),
                };
                tracing::warn!(user = %user, tool = tool.name(), "authorization timed out");
                self.failed(user, tool, err.to_string());
                Err(err)
            }
            Ok(GrantWait::Cancelled) => {
                self.update(key, AuthorizationRecord::unauthorized);
                Err(self.denied(user, tool, "authorization cancelled"))
            }
            Err(err) => Err(self.provider_failed(key, tool, err)),
        }
    }

    /// Poll until the grant settles, the wait runs out, or we are cancelled
    async fn wait_for_grant(
        &self,
        user: &UserId,
        challenge: &GrantChallenge,
        cancel: &CancellationToken,
    ) -> Result<GrantWait, ProviderError> {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.poll.max_wait())
            .unwrap_or_else(|| now + FAR_FUTURE);

        loop {
            let polled = tokio::select! {
                polled = tokio::time::timeout_at(
                    deadline,
                    self.provider.poll_authorization_status(user, challenge),
                ) => polled,
                _ = cancel.cancelled() => return Ok(GrantWait::Cancelled),
            };

            match polled {
                Err(_) => return Ok(GrantWait::TimedOut),
                Ok(status) => match status? {
                    GrantStatus::Complete => return Ok(GrantWait::Granted),
                    GrantStatus::Failed(reason) => return Ok(GrantWait::Refused(reason)),
                    GrantStatus::Pending => {}
                },
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(GrantWait::TimedOut);
            }
            let pause = self.poll.interval().min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel.cancelled() => return Ok(GrantWait::Cancelled),
            }
        }
    }

    fn update(&self, key: &PairKey, change: impl FnOnce(&mut AuthorizationRecord)) {
        let mut records = self.records.write();
        let record = records
            .entry(key.clone())
            .or_insert_with(AuthorizationRecord::new);
        change(record);
    }

    fn grant(&self, key: &PairKey, tool: &ToolDescriptor) {
        self.update(key, AuthorizationRecord::authorized);
        tracing::debug!(user = %key.0, tool = tool.name(), "authorization granted");
        self.hooks.emit(GateEvent::AuthorizationGranted {
            user: key.0.clone(),
            tool_name: tool.name().to_string(),
        });
    }

    fn refuse(&self, key: &PairKey, tool: &ToolDescriptor, reason: String) -> GatewayError {
        self.update(key, |record| record.refused(reason.clone()));
        tracing::warn!(user = %key.0, tool = tool.name(), %reason, "authorization refused");
        self.denied(&key.0, tool, &reason)
    }

    fn provider_failed(&self, key: &PairKey, tool: &ToolDescriptor, err: ProviderError) -> GatewayError {
        self.update(key, AuthorizationRecord::unauthorized);
        tracing::warn!(
            provider = self.provider.name(),
            tool = tool.name(),
            error = %err,
            "authorization failed"
        );
        self.failed(&key.0, tool, err.to_string());
        GatewayError::Provider(err)
    }

    fn denied(&self, user: &UserId, tool: &ToolDescriptor, reason: &str) -> GatewayError {
        self.failed(user, tool, reason.to_string());
        GatewayError::AuthorizationDenied {
            tool: tool.name().to_string(),
            user: user.clone(),
            reason: reason.to_string(),
        }
    }

    fn failed(&self, user: &UserId, tool: &ToolDescriptor, reason: String) {
        self.hooks.emit(GateEvent::AuthorizationFailed {
            user: user.clone(),
            tool_name: tool.name().to_string(),
            reason,
        });
    }
}
