//! Error types for the watcher pipeline.

use thiserror::Error;

/// Errors raised while turning operator configuration into a watcher.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{spec}' for --watch: {reason}")]
    InvalidWatch { spec: String, reason: String },

    #[error("Invalid name '{value}': {reason}")]
    InvalidName { value: String, reason: String },

    #[error("Invalid sender bind address '{address}': {reason}")]
    InvalidBind { address: String, reason: String },
}

/// Errors that can occur while decoding a single action payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("No ABI available for account {account}")]
    SchemaUnavailable { account: String },

    #[error("ABI for account {account} does not declare action {action}")]
    UnknownAction { account: String, action: String },

    #[error("Malformed payload for {account}::{action}: {reason}")]
    Malformed {
        account: String,
        action: String,
        reason: String,
    },

    #[error("Decoding {account}::{action} exceeded the {budget_ms}ms budget")]
    BudgetExceeded {
        account: String,
        action: String,
        budget_ms: u64,
    },
}

impl DecodeError {
    /// Returns `true` if no schema could be found (as opposed to a bad payload).
    pub fn is_schema_missing(&self) -> bool {
        matches!(self, Self::SchemaUnavailable { .. } | Self::UnknownAction { .. })
    }
}

/// Errors an [`ActionSerializer`](crate::decoder::ActionSerializer) reports
/// without knowing which account or action it was decoding.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("{0}")]
    Malformed(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Errors from the outbound transport. Each one ends the watcher; nothing
/// is buffered or retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Send to {endpoint} failed: {source}")]
    Send {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport closed: {0}")]
    Closed(String),
}

/// Umbrella error for the watcher.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event source error: {0}")]
    Source(String),
}

impl WatcherError {
    /// Returns `true` if this error originated in the outbound transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_missing_classification() {
        let missing = DecodeError::SchemaUnavailable { account: "alice".into() };
        let unknown = DecodeError::UnknownAction {
            account: "alice".into(),
            action: "transfer".into(),
        };
        let bad = DecodeError::Malformed {
            account: "alice".into(),
            action: "transfer".into(),
            reason: "unexpected end of payload".into(),
        };
        assert!(missing.is_schema_missing());
        assert!(unknown.is_schema_missing());
        assert!(!bad.is_schema_missing());
    }

    #[test]
    fn transport_error_converts_into_watcher_error() {
        let err: WatcherError = TransportError::Closed("peer gone".into()).into();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "Transport error: Transport closed: peer gone");
    }
}
