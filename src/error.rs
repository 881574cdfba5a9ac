//! Feed Error Taxonomy
//!
//! Typed failures surfaced by the use-case layer. Adapters speak
//! `anyhow::Error`; the connection manager and subscription registry
//! convert those into `FeedError` at the port boundary.
//!
//! `FeedError` is `Clone` because a single connect attempt is shared by
//! every caller awaiting it, and each of them receives the same outcome.

use thiserror::Error;

/// Errors produced by the market-data feed layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Transport or handshake failure. Retry by calling `connect()` again.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Session open failed (or the connection needed for it did).
    #[error("subscription {key} failed: {reason}")]
    Subscription {
        /// Display form of the subscription key (`SYMBOL@TIMEFRAME`).
        key: String,
        /// Underlying cause.
        reason: String,
    },

    /// Derived metrics need at least two points and a non-zero first price.
    #[error("insufficient data for price summary ({points} points)")]
    InsufficientData {
        /// Length of the series the summary was requested for.
        points: usize,
    },
}

impl FeedError {
    /// Build a connection error from any adapter failure, keeping the
    /// full context chain in the message.
    pub fn connection(err: &anyhow::Error) -> Self {
        Self::Connection(format!("{err:#}"))
    }

    /// Whether retrying the same call may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Subscription { .. })
    }
}

/// Result alias for use-case operations.
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_keeps_context_chain() {
        let err = anyhow::anyhow!("tcp reset").context("WebSocket handshake failed");
        let feed_err = FeedError::connection(&err);
        assert_eq!(
            feed_err.to_string(),
            "connection failed: WebSocket handshake failed: tcp reset"
        );
    }

    #[test]
    fn test_insufficient_data_not_retryable() {
        assert!(!FeedError::InsufficientData { points: 1 }.is_retryable());
        assert!(FeedError::Connection("down".into()).is_retryable());
    }
}
