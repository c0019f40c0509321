//! Message envelope exchanged with the message bus.

use crate::errors::EdgeflowError;
use serde::{Deserialize, Serialize};

/// MIME type for JSON payloads.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// MIME type for XML payloads.
pub const CONTENT_TYPE_XML: &str = "application/xml";

/// MIME type for plain text payloads.
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Header carrying the correlation id across transports.
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// The wire envelope for bus traffic.
///
/// Carries the correlation id end-to-end alongside the payload bytes and
/// their MIME type. The payload travels base64-encoded on the JSON wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Correlation id propagated from inbound arrival to outbound publish.
    pub correlation_id: String,

    /// The payload bytes.
    #[serde(with = "payload_codec")]
    pub payload: Vec<u8>,

    /// MIME type of the payload.
    pub content_type: String,
}

impl MessageEnvelope {
    /// Creates an envelope.
    #[must_use]
    pub fn new(
        correlation_id: impl Into<String>,
        payload: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            payload,
            content_type: content_type.into(),
        }
    }

    /// Decodes an envelope from its JSON wire form.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, EdgeflowError> {
        serde_json::from_slice(bytes).map_err(|err| EdgeflowError::Decode(err.to_string()))
    }

    /// Encodes the envelope into its JSON wire form.
    pub fn to_wire(&self) -> Result<Vec<u8>, EdgeflowError> {
        serde_json::to_vec(self).map_err(|err| EdgeflowError::Serialization(err.to_string()))
    }
}

mod payload_codec {
    //! Base64 codec for the payload field.

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_round_trip() {
        let envelope = MessageEnvelope::new("abc-123", b"{\"device\":\"d1\"}".to_vec(), CONTENT_TYPE_JSON);

        let wire = envelope.to_wire().expect("encode");
        let text = String::from_utf8(wire.clone()).expect("utf8");
        assert!(text.contains("\"correlationId\":\"abc-123\""));
        assert!(!text.contains("device"), "payload must be base64 on the wire");

        let decoded = MessageEnvelope::from_wire(&wire).expect("decode");
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_from_wire_rejects_garbage() {
        let err = MessageEnvelope::from_wire(b"not json").unwrap_err();
        assert!(matches!(err, EdgeflowError::Decode(_)));
    }
}
