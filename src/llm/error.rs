//! Model-capability error types with retry classification.
//!
//! Distinguishes transient failures (retried inside the backend with
//! backoff) from permanent ones. Whatever survives the retry policy
//! propagates out of the loop engine as a hard failure.

use std::time::Duration;

use thiserror::Error;

/// Error from the decision-capability backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Rate limited (429) - transient, retried with backoff.
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        /// Delay suggested by a Retry-After header, if present.
        retry_after: Option<Duration>,
    },

    /// Server error (5xx) - transient, retried.
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx other than 429) - permanent, not retried.
    #[error("Client error (HTTP {status}): {message}")]
    ClientError { status: u16, message: String },

    /// Connection failure or request timeout - transient, retried.
    #[error("Network error: {0}")]
    Network(String),

    /// The response could not be parsed into a decision - permanent.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ModelError {
    /// Check whether this error is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. }
                | ModelError::ServerError { .. }
                | ModelError::Network(_)
        )
    }

    /// Delay before the next retry attempt.
    ///
    /// A Retry-After value wins; otherwise exponential backoff from a
    /// per-kind base, capped at 60 seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let ModelError::RateLimited {
            retry_after: Some(delay),
            ..
        } = self
        {
            return *delay;
        }

        let base_secs: u64 = match self {
            ModelError::RateLimited { .. } => 5,
            ModelError::ServerError { .. } => 2,
            _ => 1,
        };
        let multiplier = 2u64.saturating_pow(attempt);
        Duration::from_secs(base_secs.saturating_mul(multiplier).min(60))
    }
}

/// Configuration for retry behavior in the decision backend.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Maximum total time to spend retrying.
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Check whether the given error should be retried under this config.
    pub fn should_retry(&self, error: &ModelError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Map an HTTP status code to the matching error variant.
pub fn classify_http_status(status: u16, message: String, retry_after: Option<Duration>) -> ModelError {
    match status {
        429 => ModelError::RateLimited {
            message,
            retry_after,
        },
        500..=599 => ModelError::ServerError { status, message },
        _ => ModelError::ClientError { status, message },
    }
}
