//! Inbound event model.

use crate::errors::EdgeflowError;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// A single typed reading captured by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Reading identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name of the value descriptor this reading belongs to.
    pub name: String,

    /// The reading value, rendered as a string.
    pub value: String,

    /// Value type hint (e.g., "Float64", "Int32").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    /// Origin timestamp in nanoseconds since the epoch.
    #[serde(default)]
    pub origin: i64,
}

impl Reading {
    /// Creates a new reading.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            value: value.into(),
            value_type: None,
            origin: 0,
        }
    }

    /// Sets the value type hint.
    #[must_use]
    pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    /// Sets the origin timestamp.
    #[must_use]
    pub fn with_origin(mut self, origin: i64) -> Self {
        self.origin = origin;
        self
    }
}

/// The inbound domain payload.
///
/// Immutable once decoded for a given pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier assigned by the upstream store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The device that produced the event.
    pub device: String,

    /// Origin timestamp in nanoseconds since the epoch.
    #[serde(default)]
    pub origin: i64,

    /// Content checksum, when the upstream store supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// The readings carried by this event.
    #[serde(default)]
    pub readings: Vec<Reading>,
}

impl Event {
    /// Creates a new event for the given device, stamped with the current
    /// origin time.
    #[must_use]
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            id: None,
            device: device.into(),
            origin: now_nanos(),
            checksum: None,
            readings: Vec::new(),
        }
    }

    /// Sets the event identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the content checksum.
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Appends a reading.
    #[must_use]
    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.readings.push(reading);
        self
    }

    /// Computes the md5 checksum of the event's JSON encoding.
    pub fn compute_checksum(&self) -> Result<String, EdgeflowError> {
        let encoded = serde_json::to_vec(self)?;
        let digest = Md5::digest(&encoded);
        Ok(hex::encode(digest))
    }
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_event_json() {
        assert!(serde_json::from_str::<Event>("{\"id\": \"event-1\"").is_err());

        let raw = r#"{
            "id": "event-1",
            "device": "Random-Float-Device",
            "origin": 1596509,
            "readings": [
                {"name": "Float32", "value": "1.2", "value_type": "Float32"}
            ]
        }"#;
        let event: Event = serde_json::from_str(raw).expect("valid event");
        assert_eq!(event.id.as_deref(), Some("event-1"));
        assert_eq!(event.device, "Random-Float-Device");
        assert_eq!(event.readings.len(), 1);
        assert_eq!(event.readings[0].name, "Float32");
    }

    #[test]
    fn test_builder() {
        let event = Event::new("thermostat")
            .with_id("e-42")
            .with_reading(Reading::new("temperature", "21.5").with_value_type("Float64"));

        assert_eq!(event.device, "thermostat");
        assert_eq!(event.id.as_deref(), Some("e-42"));
        assert_eq!(event.readings[0].value, "21.5");
        assert!(event.origin > 0);
    }

    #[test]
    fn test_checksum_is_stable() {
        let event = Event {
            id: Some("e-1".to_string()),
            device: "sensor".to_string(),
            origin: 42,
            checksum: None,
            readings: vec![Reading::new("count", "7")],
        };

        let first = event.compute_checksum().expect("checksum");
        let second = event.compute_checksum().expect("checksum");
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
    }
}
