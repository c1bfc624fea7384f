// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types raised by the query façade itself
//!
//! Failures coming from the session provider and the transactional executor
//! are returned untouched in the provider's own error type. The only errors
//! this crate originates are the local execution faults below, which reach the
//! caller through the provider error's `From<ExecutionError>` conversion.

use std::time::Duration;
use thiserror::Error;

/// Faults detected locally while executing a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The caller's cancellation signal fired before the work completed
    #[error("query execution cancelled")]
    Cancelled,

    /// The configured query timeout elapsed
    #[error("query execution timed out after {0:?}")]
    TimedOut(Duration),

    /// A record carried a different number of values than the result has keys
    #[error("record has {actual} values but the result has {expected} keys")]
    RecordWidthMismatch {
        /// Number of keys reported by the result
        expected: usize,
        /// Number of values found in the record
        actual: usize,
    },

    /// The session was used after it was closed
    #[error("session is closed")]
    SessionClosed,
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value
    #[error("invalid value for {name}: {reason}")]
    InvalidEnv {
        /// Variable name
        name: String,
        /// What was wrong with it
        reason: String,
    },

    /// Unknown routing control name
    #[error("unknown routing control: {0}")]
    UnknownRoutingControl(String),

    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_mismatch_message() {
        let err = ExecutionError::RecordWidthMismatch {
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "record has 1 values but the result has 2 keys"
        );
    }

    #[test]
    fn test_timeout_message_includes_duration() {
        let err = ExecutionError::TimedOut(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }
}
