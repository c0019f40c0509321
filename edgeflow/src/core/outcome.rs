//! Stage outcome type with factory constructors.

use super::Event;
use crate::errors::EdgeflowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The value flowing between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageValue {
    /// A decoded domain event.
    Event(Event),
    /// A textual payload, such as an encoded document.
    Text(String),
    /// A raw byte payload.
    Bytes(Vec<u8>),
}

impl StageValue {
    /// Renders the value as output bytes.
    ///
    /// Events are JSON-encoded; text and bytes pass through.
    pub fn into_bytes(self) -> Result<Vec<u8>, EdgeflowError> {
        match self {
            Self::Event(event) => {
                serde_json::to_vec(&event).map_err(|err| EdgeflowError::Serialization(err.to_string()))
            }
            Self::Text(text) => Ok(text.into_bytes()),
            Self::Bytes(bytes) => Ok(bytes),
        }
    }

    /// Returns a short label for the value variant, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event(_) => "event",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<Event> for StageValue {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl From<String> for StageValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for StageValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for StageValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// The continuation decision of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Run the next stage.
    Continue,
    /// Stop the run without an error (intentional filter).
    Skip,
    /// Stop the run with an error.
    Fail,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Skip => write!(f, "skip"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// The output of one stage invocation.
///
/// Immutable once created; built through the factory constructors.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Whether the runtime should invoke the next stage.
    pub status: StageStatus,

    /// The value handed to the next stage.
    pub output: Option<StageValue>,

    /// Error message, for failed invocations.
    pub error: Option<String>,

    /// Reason, for filtering invocations.
    pub skip_reason: Option<String>,
}

impl StageOutcome {
    /// Creates a continuing outcome carrying a value for the next stage.
    #[must_use]
    pub fn ok(value: impl Into<StageValue>) -> Self {
        Self {
            status: StageStatus::Continue,
            output: Some(value.into()),
            error: None,
            skip_reason: None,
        }
    }

    /// Creates a continuing outcome with no value.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self {
            status: StageStatus::Continue,
            output: None,
            error: None,
            skip_reason: None,
        }
    }

    /// Creates a filtering outcome: the run stops without an error.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skip,
            output: None,
            error: None,
            skip_reason: Some(reason.into()),
        }
    }

    /// Creates a failing outcome: the run stops with an error.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Fail,
            output: None,
            error: Some(error.into()),
            skip_reason: None,
        }
    }

    /// Creates a failing outcome from an error value.
    #[must_use]
    pub fn fail_with(error: &EdgeflowError) -> Self {
        Self::fail(error.to_string())
    }

    /// Returns true when the runtime should invoke the next stage.
    #[must_use]
    pub fn is_continue(&self) -> bool {
        self.status == StageStatus::Continue
    }

    /// Returns true when the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == StageStatus::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_carries_value() {
        let outcome = StageOutcome::ok("payload");
        assert!(outcome.is_continue());
        assert_eq!(outcome.output, Some(StageValue::Text("payload".to_string())));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_skip_is_not_failure() {
        let outcome = StageOutcome::skip("device not in filter list");
        assert!(!outcome.is_continue());
        assert!(!outcome.is_failure());
        assert_eq!(outcome.skip_reason.as_deref(), Some("device not in filter list"));
    }

    #[test]
    fn test_fail_with_uses_display() {
        let outcome = StageOutcome::fail_with(&EdgeflowError::NoData);
        assert!(outcome.is_failure());
        assert_eq!(outcome.error.as_deref(), Some("no data received"));
    }

    #[test]
    fn test_value_into_bytes() {
        let event = Event::new("sensor").with_id("e-1");
        let bytes = StageValue::Event(event).into_bytes().expect("encode");
        assert!(String::from_utf8(bytes).expect("utf8").contains("sensor"));

        let bytes = StageValue::Text("abc".to_string()).into_bytes().expect("encode");
        assert_eq!(bytes, b"abc");
    }
}
