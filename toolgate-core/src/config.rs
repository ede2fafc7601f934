//! Gateway configuration
//!
//! Configuration is layered: built-in defaults, then an optional JSON file,
//! then environment variables, then whatever the embedding application (the
//! CLI flags, usually) sets directly. Names are checked against the loaded
//! catalog before the first tool call so a typo fails at startup instead of
//! silently disabling a confirmation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::ToolCatalog;
use crate::confirmation::ConfirmationPolicy;
use crate::provider::ToolQuery;
use crate::tool::Sensitivity;
use crate::types::UserId;

/// User the run acts for
pub const ENV_USER_ID: &str = "ARCADE_USER_ID";
/// Ceiling on the wait for a grant, in seconds
pub const ENV_AUTH_MAX_WAIT_SECS: &str = "TOOLGATE_AUTH_MAX_WAIT_SECS";
/// Pause between grant status checks, in milliseconds
pub const ENV_AUTH_POLL_INTERVAL_MS: &str = "TOOLGATE_AUTH_POLL_INTERVAL_MS";
/// Ceiling on the wait for a confirmation verdict, in seconds
pub const ENV_CONFIRM_TIMEOUT_SECS: &str = "TOOLGATE_CONFIRM_TIMEOUT_SECS";

/// Longest grant wait a configuration may ask for (one day)
pub const MAX_AUTH_WAIT_SECS: u64 = 24 * 60 * 60;

/// Errors in gateway configuration. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configured tool name does not exist in the catalog
    #[error("unknown tool '{name}' in {field}")]
    UnknownTool { name: String, field: &'static str },

    #[error("no user id configured (set {} or pass one explicitly)", ENV_USER_ID)]
    MissingUserId,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Bounds on the wait for a per-user grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantPollConfig {
    /// Pause between status checks
    pub poll_interval_ms: u64,
    /// Give up after this long
    pub max_wait_secs: u64,
}

impl Default for GrantPollConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_wait_secs: 120,
        }
    }
}

impl GrantPollConfig {
    /// Sub-millisecond and sub-second remainders round up, so a non-zero
    /// duration never becomes zero
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        let interval_ms = interval.as_millis() + u128::from(interval.subsec_nanos() % 1_000_000 > 0);
        Self {
            poll_interval_ms: u64::try_from(interval_ms).unwrap_or(u64::MAX),
            max_wait_secs: whole_secs_rounded_up(max_wait),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Everything the gateway needs to know at session start
///
/// # Example file
///
/// ```json
/// {
///   "user_id": "me@example.com",
///   "toolkits": ["GoogleNews"],
///   "sensitivity": { "GoogleNews_SearchNewsStories": "sensitive" },
///   "authorization": { "max_wait_secs": 60 },
///   "confirmation": { "timeout_secs": 300 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// The human operator; required before the gateway can be built
    pub user_id: Option<String>,
    /// Toolkits to load from the provider
    pub toolkits: Vec<String>,
    /// Individual tools to load, by provider name
    pub tools: Vec<String>,
    /// Maximum number of tools listed per toolkit
    pub tool_limit: u32,
    /// Sensitivity of tools with neither an override nor a provider hint
    pub default_sensitivity: Sensitivity,
    /// Per-tool sensitivity overrides, keyed by catalog name
    pub sensitivity: BTreeMap<String, Sensitivity>,
    pub authorization: GrantPollConfig,
    pub confirmation: ConfirmationPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            toolkits: vec!["GoogleNews".to_string()],
            tools: Vec::new(),
            tool_limit: 100,
            default_sensitivity: Sensitivity::Sensitive,
            sensitivity: BTreeMap::new(),
            authorization: GrantPollConfig::default(),
            confirmation: ConfirmationPolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Overlay values from the process environment
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = lookup(ENV_USER_ID).filter(|v| !v.trim().is_empty()) {
            self.user_id = Some(user.trim().to_string());
        }
        if let Some(secs) = parse_env(&lookup, ENV_AUTH_MAX_WAIT_SECS)? {
            self.authorization.max_wait_secs = secs;
        }
        if let Some(ms) = parse_env(&lookup, ENV_AUTH_POLL_INTERVAL_MS)? {
            self.authorization.poll_interval_ms = ms;
        }
        if let Some(secs) = parse_env(&lookup, ENV_CONFIRM_TIMEOUT_SECS)? {
            self.confirmation.timeout_secs = Some(secs);
        }
        Ok(self)
    }

    /// The configured user, or [`ConfigError::MissingUserId`]
    pub fn user_id(&self) -> Result<UserId, ConfigError> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(UserId::from)
            .ok_or(ConfigError::MissingUserId)
    }

    /// The provider query this configuration describes
    pub fn tool_query(&self) -> ToolQuery {
        ToolQuery {
            toolkits: self.toolkits.clone(),
            tools: self.tools.clone(),
            limit: self.tool_limit,
        }
    }

    /// Checks that need no catalog
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.toolkits.is_empty() && self.tools.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one toolkit or tool must be configured".to_string(),
            ));
        }
        if self.tool_limit == 0 {
            return Err(ConfigError::Invalid("tool_limit must be positive".to_string()));
        }
        if self.authorization.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "authorization.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.authorization.max_wait_secs == 0 {
            return Err(ConfigError::Invalid(
                "authorization.max_wait_secs must be positive".to_string(),
            ));
        }
        if self.authorization.max_wait_secs > MAX_AUTH_WAIT_SECS {
            return Err(ConfigError::Invalid(format!(
                "authorization.max_wait_secs must be at most {}",
                MAX_AUTH_WAIT_SECS
            )));
        }
        if self.confirmation.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "confirmation.timeout_secs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Every tool name the configuration mentions must exist in `catalog`
    pub fn validate_against(&self, catalog: &ToolCatalog) -> Result<(), ConfigError> {
        self.validate()?;

        let enforced = self.confirmation.enforce_for.iter().flatten();
        let named = enforced
            .map(|name| (name, "confirmation.enforce_for"))
            .chain(self.confirmation.exempt.iter().map(|name| (name, "confirmation.exempt")))
            .chain(self.sensitivity.keys().map(|name| (name, "sensitivity")));

        for (name, field) in named {
            if catalog.get(name).is_none() {
                return Err(ConfigError::UnknownTool {
                    name: name.clone(),
                    field,
                });
            }
        }
        Ok(())
    }
}

fn parse_env<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{} must be a whole number, got '{}'", key, raw))),
    }
}

pub(crate) fn whole_secs_rounded_up(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_add(u64::from(duration.subsec_nanos() > 0))
}
