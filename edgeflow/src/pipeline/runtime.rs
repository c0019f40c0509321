//! Ordered stage execution with short-circuit semantics.

use crate::context::ExecutionContext;
use crate::core::{Event, MessageEnvelope, StageStatus, StageValue};
use crate::errors::EdgeflowError;
use crate::stages::TransformStage;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Executes an ordered stage sequence against one context per invocation.
///
/// The sequence is fixed at construction and never mutated during
/// execution. All side effects of a run land in its `ExecutionContext`.
pub struct PipelineRuntime {
    stages: Vec<Arc<dyn TransformStage>>,
}

impl PipelineRuntime {
    /// Creates a runtime over the given stage sequence.
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn TransformStage>>) -> Self {
        Self { stages }
    }

    /// Returns the number of configured stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Decodes an arrival and runs the stage chain against it.
    ///
    /// Decode failures abort before any stage executes and surface as a
    /// decode error; the arrival is never partially processed. Per-stage
    /// failures end the run and are reported exactly once through the
    /// context's sink; intentional filters end the run silently.
    pub async fn process_event(
        &self,
        ctx: &ExecutionContext,
        envelope: &MessageEnvelope,
    ) -> Result<(), EdgeflowError> {
        let event: Event = serde_json::from_slice(&envelope.payload)
            .map_err(|err| EdgeflowError::Decode(err.to_string()))?;
        self.run(ctx, event).await;
        Ok(())
    }

    /// Runs the stage chain against an already-decoded event.
    ///
    /// When every stage continues and the final stage produced a value,
    /// that value is recorded as the run's output. Stages may instead call
    /// [`ExecutionContext::complete`] at any point.
    pub async fn run(&self, ctx: &ExecutionContext, event: Event) {
        if self.stages.is_empty() {
            warn!(
                correlation_id = %ctx.correlation_id(),
                "pipeline has no stages configured, dropping event"
            );
            return;
        }
        ctx.set_source_event(&event);

        let mut value = Some(StageValue::Event(event));
        for stage in &self.stages {
            let outcome = stage.execute(ctx, value.take()).await;
            match outcome.status {
                StageStatus::Continue => value = outcome.output,
                StageStatus::Skip => {
                    debug!(
                        correlation_id = %ctx.correlation_id(),
                        stage = stage.name(),
                        reason = outcome.skip_reason.as_deref().unwrap_or(""),
                        "stage filtered the event"
                    );
                    ctx.sink().try_emit(
                        "pipeline.filtered",
                        ctx.correlation_id(),
                        Some(serde_json::json!({
                            "stage": stage.name(),
                            "reason": outcome.skip_reason,
                        })),
                    );
                    return;
                }
                StageStatus::Fail => {
                    let message = outcome
                        .error
                        .unwrap_or_else(|| "stage failed without detail".to_string());
                    error!(
                        correlation_id = %ctx.correlation_id(),
                        stage = stage.name(),
                        error = %message,
                        "stage failed, dropping event"
                    );
                    ctx.sink().try_emit(
                        "pipeline.failed",
                        ctx.correlation_id(),
                        Some(serde_json::json!({
                            "stage": stage.name(),
                            "error": message,
                        })),
                    );
                    return;
                }
            }
        }

        if let Some(value) = value {
            match value.into_bytes() {
                Ok(payload) => ctx.complete(payload),
                Err(err) => error!(
                    correlation_id = %ctx.correlation_id(),
                    error = %err,
                    "failed to encode final stage output"
                ),
            }
        }
        ctx.sink()
            .try_emit("pipeline.completed", ctx.correlation_id(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Reading, CONTENT_TYPE_JSON};
    use crate::events::CollectingEventSink;
    use crate::stages::{DeviceNameFilter, FnStage, JsonTransform};
    use crate::core::StageOutcome;
    use parking_lot::Mutex;

    fn sample_event() -> Event {
        Event::new("Random-Float-Device")
            .with_id("e-1")
            .with_reading(Reading::new("Float32", "1.2"))
    }

    fn recording_stage(
        name: &str,
        log: Arc<Mutex<Vec<String>>>,
        outcome: fn() -> StageOutcome,
    ) -> Arc<dyn TransformStage> {
        let name_owned = name.to_string();
        Arc::new(FnStage::new(name, move |_ctx, _input| {
            log.lock().push(name_owned.clone());
            outcome()
        }))
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runtime = PipelineRuntime::new(vec![
            recording_stage("one", log.clone(), StageOutcome::ok_empty),
            recording_stage("two", log.clone(), StageOutcome::ok_empty),
            recording_stage("three", log.clone(), StageOutcome::ok_empty),
        ]);
        let ctx = ExecutionContext::new("abc");

        runtime.run(&ctx, sample_event()).await;

        assert_eq!(log.lock().as_slice(), ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_failure_short_circuits_with_one_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = PipelineRuntime::new(vec![
            recording_stage("one", log.clone(), StageOutcome::ok_empty),
            recording_stage("boom", log.clone(), || StageOutcome::fail("boom")),
            recording_stage("never", log.clone(), StageOutcome::ok_empty),
        ]);
        let ctx = ExecutionContext::new("abc").with_sink(sink.clone());

        runtime.run(&ctx, sample_event()).await;

        assert_eq!(log.lock().as_slice(), ["one", "boom"]);
        assert_eq!(sink.count_of("pipeline.failed"), 1);
        assert!(ctx.output().is_none());
    }

    #[tokio::test]
    async fn test_filter_short_circuits_without_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = PipelineRuntime::new(vec![
            recording_stage("filter", log.clone(), || StageOutcome::skip("filtered")),
            recording_stage("never", log.clone(), StageOutcome::ok_empty),
        ]);
        let ctx = ExecutionContext::new("abc").with_sink(sink.clone());

        runtime.run(&ctx, sample_event()).await;

        assert_eq!(log.lock().as_slice(), ["filter"]);
        assert_eq!(sink.count_of("pipeline.failed"), 0);
        assert!(ctx.output().is_none());
    }

    #[tokio::test]
    async fn test_filter_then_encode_sets_output_for_matching_device() {
        let runtime = PipelineRuntime::new(vec![
            Arc::new(DeviceNameFilter::new(vec!["Random-Float-Device".to_string()])),
            Arc::new(JsonTransform::new()),
        ]);
        let ctx = ExecutionContext::new("abc");

        runtime.run(&ctx, sample_event()).await;

        let output = ctx.output().expect("output set");
        let text = String::from_utf8(output).expect("utf8");
        assert!(text.contains("Random-Float-Device"));
    }

    #[tokio::test]
    async fn test_filter_then_encode_leaves_output_unset_for_other_device() {
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = PipelineRuntime::new(vec![
            Arc::new(DeviceNameFilter::new(vec!["Other-Device".to_string()])),
            Arc::new(JsonTransform::new()),
        ]);
        let ctx = ExecutionContext::new("abc").with_sink(sink.clone());

        runtime.run(&ctx, sample_event()).await;

        assert!(ctx.output().is_none());
        assert_eq!(sink.count_of("pipeline.failed"), 0);
    }

    #[tokio::test]
    async fn test_explicit_complete_survives_a_final_skip() {
        let runtime = PipelineRuntime::new(vec![Arc::new(FnStage::new(
            "print-and-complete",
            |ctx: &ExecutionContext, input| match input {
                Some(StageValue::Event(event)) => {
                    match serde_json::to_vec(&event) {
                        Ok(payload) => ctx.complete(payload),
                        Err(_) => return StageOutcome::fail("encode failed"),
                    }
                    StageOutcome::skip("terminal stage")
                }
                _ => StageOutcome::fail("expected event"),
            },
        ))]);
        let ctx = ExecutionContext::new("abc");

        runtime.run(&ctx, sample_event()).await;

        assert!(ctx.output().is_some());
    }

    #[tokio::test]
    async fn test_decode_failure_aborts_before_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runtime = PipelineRuntime::new(vec![recording_stage(
            "one",
            log.clone(),
            StageOutcome::ok_empty,
        )]);
        let ctx = ExecutionContext::new("abc");
        let envelope = MessageEnvelope::new("abc", b"not json".to_vec(), CONTENT_TYPE_JSON);

        let result = runtime.process_event(&ctx, &envelope).await;

        assert!(matches!(result, Err(EdgeflowError::Decode(_))));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_process_event_decodes_payload() {
        let runtime = PipelineRuntime::new(vec![Arc::new(JsonTransform::new())]);
        let ctx = ExecutionContext::new("abc");
        let payload = serde_json::to_vec(&sample_event()).expect("encode");
        let envelope = MessageEnvelope::new("abc", payload, CONTENT_TYPE_JSON);

        runtime.process_event(&ctx, &envelope).await.expect("run");

        assert!(ctx.output().is_some());
        assert_eq!(ctx.event_id().as_deref(), Some("e-1"));
    }

    #[tokio::test]
    async fn test_empty_pipeline_produces_no_output() {
        let runtime = PipelineRuntime::new(Vec::new());
        let ctx = ExecutionContext::new("abc");

        runtime.run(&ctx, sample_event()).await;

        assert!(ctx.output().is_none());
    }
}
