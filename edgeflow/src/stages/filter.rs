//! Event filtering stages.

use super::TransformStage;
use crate::context::ExecutionContext;
use crate::core::{StageOutcome, StageValue};
use crate::errors::EdgeflowError;
use async_trait::async_trait;

/// Passes an event through only when its device is in the allow list.
///
/// A non-matching event ends the run as an intentional filter, not a
/// failure.
#[derive(Debug, Clone)]
pub struct DeviceNameFilter {
    device_names: Vec<String>,
}

impl DeviceNameFilter {
    /// Creates a filter for the given device names.
    #[must_use]
    pub fn new(device_names: Vec<String>) -> Self {
        Self { device_names }
    }
}

#[async_trait]
impl TransformStage for DeviceNameFilter {
    fn name(&self) -> &str {
        "device-name-filter"
    }

    async fn execute(&self, _ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome {
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

        if self.device_names.iter().any(|name| name == &event.device) {
            StageOutcome::ok(event)
        } else {
            StageOutcome::skip(format!("device {} not in filter list", event.device))
        }
    }
}

/// Drops readings whose value descriptor is not in the allow list.
///
/// When no reading survives, the event is filtered entirely.
#[derive(Debug, Clone)]
pub struct ValueDescriptorFilter {
    descriptors: Vec<String>,
}

impl ValueDescriptorFilter {
    /// Creates a filter for the given value descriptor names.
    #[must_use]
    pub fn new(descriptors: Vec<String>) -> Self {
        Self { descriptors }
    }
}

#[async_trait]
impl TransformStage for ValueDescriptorFilter {
    fn name(&self) -> &str {
        "value-descriptor-filter"
    }

    async fn execute(&self, _ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome {
        let Some(value) = input else {
            return StageOutcome::fail_with(&EdgeflowError::NoData);
        };
        let mut event = match value {
            StageValue::Event(event) => event,
            other => {
                return StageOutcome::fail_with(&EdgeflowError::UnexpectedType(
                    other.kind().to_string(),
                ))
            }
        };

        event
            .readings
            .retain(|reading| self.descriptors.iter().any(|name| name == &reading.name));
        if event.readings.is_empty() {
            StageOutcome::skip("no readings match the descriptor filter")
        } else {
            StageOutcome::ok(event)
        }
    }
}
