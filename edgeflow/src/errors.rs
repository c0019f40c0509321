//! Error types for the edgeflow SDK.
//!
//! Every per-arrival error is local to that arrival; only
//! initialization-time errors are fatal to the owning component.

use thiserror::Error;

/// The main error type for edgeflow operations.
#[derive(Debug, Error)]
pub enum EdgeflowError {
    /// A stage was invoked with no upstream value.
    #[error("no data received")]
    NoData,

    /// A stage was invoked with a value it cannot interpret.
    #[error("unexpected type received: {0}")]
    UnexpectedType(String),

    /// The broker was unreachable when a publish was attempted.
    #[error("could not connect to broker: {0}")]
    Connect(String),

    /// The broker rejected or failed to acknowledge a publish.
    #[error("failed to publish to broker: {0}")]
    Publish(String),

    /// A malformed inbound arrival.
    #[error("failed to decode arrival: {0}")]
    Decode(String),

    /// The upstream store rejected a retention marking.
    #[error("failed to mark event as pushed: {0}")]
    Retention(String),

    /// A message bus operation failed.
    #[error("message bus error: {0}")]
    MessageBus(String),

    /// The store client failed.
    #[error("store client error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A component failed to start.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EdgeflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_messages() {
        assert_eq!(EdgeflowError::NoData.to_string(), "no data received");
        assert_eq!(
            EdgeflowError::UnexpectedType("event".to_string()).to_string(),
            "unexpected type received: event"
        );
        assert_eq!(
            EdgeflowError::Connect("broker down".to_string()).to_string(),
            "could not connect to broker: broker down"
        );
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let mapped = EdgeflowError::from(err);
        assert!(matches!(mapped, EdgeflowError::Serialization(_)));
    }
}
