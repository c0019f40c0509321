//! Payload encoding stages.

use super::TransformStage;
use crate::context::ExecutionContext;
use crate::core::{Event, StageOutcome, StageValue, CONTENT_TYPE_JSON, CONTENT_TYPE_XML};
use crate::errors::EdgeflowError;
use async_trait::async_trait;
use serde::Serialize;

/// Encodes the incoming event as an XML document string.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlTransform;

impl XmlTransform {
    /// Creates the transform.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformStage for XmlTransform {
    fn name(&self) -> &str {
        "xml-transform"
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome {
        let Some(value) = input else {
            return StageOutcome::fail_with(&EdgeflowError::NoData);
        };
        let event = match value {
            StageValue::Event(event) => event,
            other => {
                return StageOutcome::fail_with(&EdgeflowError::UnexpectedType(
                    other.kind().to_string(),
                ))
            }
        };

        match to_xml(&event) {
            Ok(xml) => {
                ctx.set_response_content_type(CONTENT_TYPE_XML);
                StageOutcome::ok(xml)
            }
            Err(err) => StageOutcome::fail(err.to_string()),
        }
    }
}

/// Encodes the incoming event as a JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransform;

impl JsonTransform {
    /// Creates the transform.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformStage for JsonTransform {
    fn name(&self) -> &str {
        "json-transform"
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome {
        let Some(value) = input else {
            return StageOutcome::fail_with(&EdgeflowError::NoData);
        };
        let event = match value {
            StageValue::Event(event) => event,
            other => {
                return StageOutcome::fail_with(&EdgeflowError::UnexpectedType(
                    other.kind().to_string(),
                ))
            }
        };

        match serde_json::to_string(&event) {
            Ok(json) => {
                ctx.set_response_content_type(CONTENT_TYPE_JSON);
                StageOutcome::ok(json)
            }
            Err(err) => StageOutcome::fail(err.to_string()),
        }
    }
}

// XML view of the event; kept separate so the JSON wire names stay
// untouched.
#[derive(Serialize)]
#[serde(rename = "Event", rename_all = "PascalCase")]
struct XmlEvent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    device: &'a str,
    origin: i64,
    #[serde(rename = "Reading")]
    readings: Vec<XmlReading<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct XmlReading<'a> {
    name: &'a str,
    value: &'a str,
    origin: i64,
}

fn to_xml(event: &Event) -> Result<String, EdgeflowError> {
    let view = XmlEvent {
        id: event.id.as_deref(),
        device: &event.device,
        origin: event.origin,
        readings: event
            .readings
            .iter()
            .map(|reading| XmlReading {
                name: &reading.name,
                value: &reading.value,
                origin: reading.origin,
            })
            .collect(),
    };
    quick_xml::se::to_string(&view).map_err(|err| EdgeflowError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Reading;

    fn sample_event() -> Event {
        Event {
            id: Some("e-1".to_string()),
            device: "Random-Float-Device".to_string(),
            origin: 42,
            checksum: None,
            readings: vec![Reading::new("Float32", "1.2").with_origin(42)],
        }
    }

    #[tokio::test]
    async fn test_xml_transform_encodes_event() {
        let stage = XmlTransform::new();
        let ctx = ExecutionContext::new("test");

        let outcome = stage.execute(&ctx, Some(sample_event().into())).await;

        let Some(StageValue::Text(xml)) = outcome.output else {
            panic!("expected text output");
        };
        assert!(xml.starts_with("<Event>"));
        assert!(xml.contains("<Device>Random-Float-Device</Device>"));
        assert!(xml.contains("<Name>Float32</Name>"));
        assert_eq!(ctx.response_content_type(), CONTENT_TYPE_XML);
    }

    #[tokio::test]
    async fn test_json_transform_encodes_event() {
        let stage = JsonTransform::new();
        let ctx = ExecutionContext::new("test");

        let outcome = stage.execute(&ctx, Some(sample_event().into())).await;

        let Some(StageValue::Text(json)) = outcome.output else {
            panic!("expected text output");
        };
        let decoded: Event = serde_json::from_str(&json).expect("round trip");
        assert_eq!(decoded.device, "Random-Float-Device");
    }

    #[tokio::test]
    async fn test_transform_rejects_non_event_input() {
        let stage = XmlTransform::new();
        let ctx = ExecutionContext::new("test");

        let outcome = stage
            .execute(&ctx, Some(StageValue::Text("not an event".to_string())))
            .await;

        assert!(outcome.is_failure());
        assert_eq!(
            outcome.error.as_deref(),
            Some("unexpected type received: text")
        );
    }
}
