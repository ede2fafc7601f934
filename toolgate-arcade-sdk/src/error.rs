//! Error types for the Arcade SDK

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// API Error Types
// ============================================================================

/// Error body returned by the Arcade API
///
/// The API is not fully consistent about the field carrying the message, so
/// both `message` and `error` are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorResponse {
    /// Best available human-readable message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}

// ============================================================================
// SDK Error Types
// ============================================================================

/// Errors that can occur when using the Arcade API
#[derive(Debug, Error)]
pub enum ArcadeError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limited by the API
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Service unavailable or overloaded
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Invalid request (bad parameters, unknown tool, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid response (failed to parse API response)
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error (missing API key, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl ArcadeError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArcadeError::RateLimited(_) | ArcadeError::ServiceUnavailable(_) | ArcadeError::Network(_)
        )
    }

    /// Returns true if a response with this HTTP status should be retried
    pub fn is_retryable_status(status_code: u16) -> bool {
        matches!(status_code, 408 | 409 | 429 | 500..=599)
    }

    /// Classify an HTTP error status and its message
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            401 | 403 => ArcadeError::Authentication(message),
            404 => ArcadeError::NotFound(message),
            429 => ArcadeError::RateLimited(message),
            400 | 422 => ArcadeError::InvalidRequest(message),
            500..=599 => ArcadeError::ServiceUnavailable(message),
            _ => ArcadeError::Other(message),
        }
    }

    /// Classify a transport error from reqwest
    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ArcadeError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ArcadeError::Network(format!("Connection failed: {}", err))
        } else if err.is_request() {
            ArcadeError::Network(format!("Request failed: {}", err))
        } else if let Some(status) = err.status() {
            ArcadeError::from_status(status.as_u16(), err.to_string())
        } else {
            ArcadeError::Other(err.to_string())
        }
    }
}

/// Parse an error body into an [`ArcadeError`], falling back to the raw body
pub(crate) fn parse_error_response(body: &str, status_code: u16) -> ArcadeError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.message().map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status_code)
            } else {
                format!("HTTP {}: {}", status_code, body.trim())
            }
        });
    ArcadeError::from_status(status_code, message)
}

/// Configuration for automatic retry behavior
///
/// - Exponential backoff: base_delay × 2^attempt with jitter
/// - Maximum delay capped at 8 seconds
/// - Respects the Retry-After header
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    pub max_retries: u32,

    /// Base delay for exponential backoff (default: 500ms)
    pub base_delay: Duration,

    /// Maximum delay between retries (default: 8s)
    pub max_delay: Duration,

    /// Jitter factor (0.0-1.0) to add randomness to delays (default: 0.25)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the specified max retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Disable retries
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Delay before retry `attempt` (0-indexed)
    pub(crate) fn delay_for_attempt(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base = self.base_delay.as_secs_f64() * 2_f64.powi(attempt as i32);
        let jitter_range = base * self.jitter;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let delay = Duration::from_secs_f64((base + jitter).max(0.0));
        delay.min(self.max_delay)
    }

    /// Parse a retry delay from the standard Retry-After header (seconds only)
    pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}
