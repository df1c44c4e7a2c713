//! Error types for the balancer.

use thiserror::Error;

/// Result type for balancer operations.
pub type BalancerResult<T> = Result<T, BalancerError>;

/// Errors that can occur while balancing.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// No backend is currently marked alive.
    #[error("no live backend available")]
    NoBackend,

    /// The outbound request to a backend failed.
    #[error("upstream request failed: {message}")]
    Upstream {
        /// Description of the failure.
        message: String,
    },

    /// The balancer configuration is unusable.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl BalancerError {
    /// Creates an upstream-failure error.
    pub fn upstream(message: impl ToString) -> Self {
        Self::Upstream {
            message: message.to_string(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
