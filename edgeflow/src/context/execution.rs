//! The mutable context threaded through one pipeline run.

use crate::core::{Event, CONTENT_TYPE_JSON};
use crate::events::{EventSink, NoOpEventSink};
use crate::store::StoreClient;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, warn};

/// Per-event mutable state and side-effect surface.
///
/// Exactly one context exists per inbound arrival; it is never shared
/// across concurrent arrivals and is not reused after the run finishes.
/// The output slot is the sole sanctioned channel back to the trigger.
pub struct ExecutionContext {
    correlation_id: String,
    event_id: RwLock<Option<String>>,
    event_checksum: RwLock<Option<String>>,
    store: Option<Arc<dyn StoreClient>>,
    sink: Arc<dyn EventSink>,
    output: RwLock<Option<Vec<u8>>>,
    response_content_type: RwLock<Option<String>>,
}

impl ExecutionContext {
    /// Creates a context for one arrival.
    #[must_use]
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            event_id: RwLock::new(None),
            event_checksum: RwLock::new(None),
            store: None,
            sink: Arc::new(NoOpEventSink),
            output: RwLock::new(None),
            response_content_type: RwLock::new(None),
        }
    }

    /// Attaches the upstream store client used for retention marking.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StoreClient>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attaches the event sink for this run.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the correlation id propagated end-to-end.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Records the source event identity once the arrival is decoded.
    pub fn set_source_event(&self, event: &Event) {
        *self.event_id.write() = event.id.clone();
        *self.event_checksum.write() = event.checksum.clone();
    }

    /// Returns the source event id, if known.
    #[must_use]
    pub fn event_id(&self) -> Option<String> {
        self.event_id.read().clone()
    }

    /// Returns the source event checksum, if known.
    #[must_use]
    pub fn event_checksum(&self) -> Option<String> {
        self.event_checksum.read().clone()
    }

    /// Sets the output slot. The last caller wins.
    pub fn complete(&self, payload: impl Into<Vec<u8>>) {
        *self.output.write() = Some(payload.into());
    }

    /// Sets the content type reported alongside the output payload.
    pub fn set_response_content_type(&self, content_type: impl Into<String>) {
        *self.response_content_type.write() = Some(content_type.into());
    }

    /// Returns the content type for the output payload (JSON when unset).
    #[must_use]
    pub fn response_content_type(&self) -> String {
        self.response_content_type
            .read()
            .clone()
            .unwrap_or_else(|| CONTENT_TYPE_JSON.to_string())
    }

    /// Returns a copy of the output slot.
    #[must_use]
    pub fn output(&self) -> Option<Vec<u8>> {
        self.output.read().clone()
    }

    /// Takes the output slot, leaving it empty.
    #[must_use]
    pub fn take_output(&self) -> Option<Vec<u8>> {
        self.output.write().take()
    }

    /// Returns the event sink attached to this run.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Asks the upstream store to mark the source event as consumed.
    ///
    /// Best effort: failures are logged and never alter the run's
    /// continuation decision. The checksum is preferred over the id when
    /// both are known.
    pub async fn mark_as_pushed(&self) {
        let Some(store) = self.store.as_ref() else {
            warn!(
                correlation_id = %self.correlation_id,
                "no store client configured, skipping retention marking"
            );
            return;
        };

        let checksum = self.event_checksum.read().clone();
        let event_id = self.event_id.read().clone();
        let result = match (checksum, event_id) {
            (Some(checksum), _) => store.mark_pushed_by_checksum(&checksum).await,
            (None, Some(id)) => store.mark_pushed(&id).await,
            (None, None) => {
                warn!(
                    correlation_id = %self.correlation_id,
                    "source event has neither id nor checksum, skipping retention marking"
                );
                return;
            }
        };

        if let Err(err) = result {
            error!(
                correlation_id = %self.correlation_id,
                error = %err,
                "retention marking failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::RecordingStoreClient;

    #[test]
    fn test_output_slot_last_writer_wins() {
        let ctx = ExecutionContext::new("abc-123");
        assert!(ctx.output().is_none());

        ctx.complete(b"first".to_vec());
        ctx.complete(b"second".to_vec());
        assert_eq!(ctx.output(), Some(b"second".to_vec()));

        assert_eq!(ctx.take_output(), Some(b"second".to_vec()));
        assert!(ctx.output().is_none());
    }

    #[test]
    fn test_response_content_type_defaults_to_json() {
        let ctx = ExecutionContext::new("abc-123");
        assert_eq!(ctx.response_content_type(), CONTENT_TYPE_JSON);

        ctx.set_response_content_type("application/xml");
        assert_eq!(ctx.response_content_type(), "application/xml");
    }

    #[tokio::test]
    async fn test_mark_as_pushed_prefers_checksum() {
        let store = Arc::new(RecordingStoreClient::default());
        let ctx = ExecutionContext::new("abc-123").with_store(store.clone());
        ctx.set_source_event(
            &Event::new("sensor").with_id("e-1").with_checksum("cafe"),
        );

        ctx.mark_as_pushed().await;

        assert_eq!(store.calls.lock().as_slice(), ["checksum:cafe"]);
    }

    #[tokio::test]
    async fn test_mark_as_pushed_falls_back_to_id() {
        let store = Arc::new(RecordingStoreClient::default());
        let ctx = ExecutionContext::new("abc-123").with_store(store.clone());
        ctx.set_source_event(&Event::new("sensor").with_id("e-1"));

        ctx.mark_as_pushed().await;

        assert_eq!(store.calls.lock().as_slice(), ["id:e-1"]);
    }

    #[tokio::test]
    async fn test_mark_as_pushed_failure_is_swallowed() {
        let store = Arc::new(RecordingStoreClient::failing());
        let ctx = ExecutionContext::new("abc-123").with_store(store.clone());
        ctx.set_source_event(&Event::new("sensor").with_id("e-1"));

        ctx.mark_as_pushed().await;

        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mark_as_pushed_without_store_is_a_noop() {
        let ctx = ExecutionContext::new("abc-123");
        ctx.mark_as_pushed().await;
    }
}
