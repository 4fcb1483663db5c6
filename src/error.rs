use thiserror::Error;

use crate::CorrelationId;

/// Errors produced by clients, servers, the codec and transports.
///
/// Construction-time problems (`Schema`, `InvalidTypeName`, `InvalidTopic`)
/// prevent a client or server from being built at all. Per-call problems
/// (`TypeMismatch`, `Timeout`, `DuplicateCorrelationId`) only ever affect the
/// call that observed them.
#[derive(Error, Debug)]
pub enum Error {
    /// A service descriptor is missing, or misnames, its `Request` or
    /// `Response` shape.
    #[error("schema error: {0}")]
    Schema(String),

    /// Bytes did not conform to the shape they were decoded against.
    #[error("message type mismatch: expected '{expected}', got '{found}'")]
    TypeMismatch { expected: String, found: String },

    /// No reply arrived before the call's deadline.
    ///
    /// Distinct from every other variant so callers can retry on it.
    #[error("request timed out")]
    Timeout,

    /// A correlation id was registered twice while still pending.
    #[error("duplicate correlation id: {0}")]
    DuplicateCorrelationId(CorrelationId),

    /// A type identifier does not follow `<package>/<msgs|srvs>/<module>/<Type>`.
    #[error("invalid type identifier '{name}': {reason}")]
    InvalidTypeName { name: String, reason: String },

    /// A service or topic name cannot be mapped onto transport topics.
    #[error("invalid topic name '{0}'")]
    InvalidTopic(String),

    /// Envelope framing could not be parsed.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// JSON encoding of a message body failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying transport failed to publish or subscribe.
    #[error("transport error: {0}")]
    Transport(String),

    /// A service handler reported failure for one request.
    #[error("handler error: {0}")]
    Handler(String),

    /// The client, server or transport was closed.
    #[error("closed")]
    Closed,
}

impl Error {
    /// Build a handler failure from any displayable reason.
    pub fn handler(reason: impl std::fmt::Display) -> Self {
        Self::Handler(reason.to_string())
    }

    /// True for outcomes worth retrying with a fresh call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        // ---
        let err = Error::TypeMismatch {
            expected: "demo/msgs/geometry/Pose".into(),
            found: "demo/msgs/geometry/Point".into(),
        };
        assert_eq!(
            err.to_string(),
            "message type mismatch: expected 'demo/msgs/geometry/Pose', got 'demo/msgs/geometry/Point'"
        );
    }

    #[test]
    fn test_only_timeout_is_retryable() {
        // ---
        assert!(Error::Timeout.is_retryable());
        assert!(!Error::Closed.is_retryable());
        assert!(!Error::Schema("x".into()).is_retryable());
        assert!(!Error::handler("boom").is_retryable());
    }
}
