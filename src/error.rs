//! Error types for the bridgewatch engine.
//!
//! Failures local to one bridge or one subscriber are contained by the
//! orchestrator; the variants here describe what went wrong so callers can
//! decide whether to surface, retry, or just log.

use thiserror::Error;

/// Result type alias for bridgewatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bridgewatch engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Unknown bridge id passed to a status/details query
    #[error("bridge not found: {0}")]
    BridgeNotFound(String),

    /// A single endpoint probe failed (timeout, connection refused, bad status)
    #[error("endpoint unreachable: {url}: {reason}")]
    EndpointUnreachable {
        /// Endpoint URL that was probed
        url: String,
        /// Failure description
        reason: String,
    },

    /// Risk scoring could not be computed for a bridge
    #[error("risk assessment failed for {bridge_id}: {reason}")]
    AssessmentFailed {
        /// Bridge the assessment was requested for
        bridge_id: String,
        /// Failure description
        reason: String,
    },

    /// An alert subscriber callback panicked during delivery
    #[error("alert subscriber failed: {0}")]
    Subscriber(String),

    /// Configuration rejected by a defensive check
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (should not happen in production)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error is contained by the monitoring cycle
    /// rather than surfaced to the orchestrator's caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EndpointUnreachable { .. }
                | Error::AssessmentFailed { .. }
                | Error::Subscriber(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::EndpointUnreachable {
            url: "https://rpc.example".into(),
            reason: "timed out".into(),
        };
        assert!(err.to_string().contains("https://rpc.example"));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Subscriber("boom".into()).is_recoverable());
        assert!(Error::AssessmentFailed {
            bridge_id: "b".into(),
            reason: "no data".into()
        }
        .is_recoverable());
        assert!(!Error::BridgeNotFound("b".into()).is_recoverable());
        assert!(!Error::InvalidConfig("empty".into()).is_recoverable());
    }
}
