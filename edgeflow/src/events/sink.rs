//! Event sink trait and implementations.

use tracing::{debug, error, info, Level};

/// A sink receiving pipeline lifecycle events.
///
/// Triggers hand a sink to every pipeline run; the runtime and stages emit
/// events such as `pipeline.failed` or `export.sent` through it. Emission
/// never blocks a run and never fails it.
pub trait EventSink: Send + Sync {
    /// Emits an event. Must not panic; errors are suppressed.
    fn try_emit(&self, event_type: &str, correlation_id: &str, data: Option<serde_json::Value>);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _correlation_id: &str, _data: Option<serde_json::Value>) {}
}

/// A sink that logs events through the tracing framework.
///
/// Failure events (`*.failed`) log at error level regardless of the
/// configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink emitting at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event_type: &str, correlation_id: &str, data: Option<serde_json::Value>) {
        if event_type.ends_with(".failed") {
            error!(
                event_type = %event_type,
                correlation_id = %correlation_id,
                data = ?data,
                "pipeline event"
            );
            return;
        }
        if self.level >= Level::DEBUG {
            debug!(
                event_type = %event_type,
                correlation_id = %correlation_id,
                data = ?data,
                "pipeline event"
            );
        } else {
            info!(
                event_type = %event_type,
                correlation_id = %correlation_id,
                data = ?data,
                "pipeline event"
            );
        }
    }
}

/// A sink that records events, for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<CollectedEvent>>,
}

/// One recorded event.
#[derive(Debug, Clone)]
pub struct CollectedEvent {
    /// The event type.
    pub event_type: String,
    /// The correlation id carried by the run.
    pub correlation_id: String,
    /// The event payload, if any.
    pub data: Option<serde_json::Value>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<CollectedEvent> {
        self.events.read().clone()
    }

    /// Counts recorded events of the given type.
    #[must_use]
    pub fn count_of(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event_type: &str, correlation_id: &str, data: Option<serde_json::Value>) {
        self.events.write().push(CollectedEvent {
            event_type: event_type.to_string(),
            correlation_id: correlation_id.to_string(),
            data,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_records() {
        let sink = CollectingEventSink::new();
        sink.try_emit("pipeline.failed", "abc", Some(serde_json::json!({"stage": "s1"})));
        sink.try_emit("pipeline.completed", "abc", None);

        assert_eq!(sink.count_of("pipeline.failed"), 1);
        assert_eq!(sink.count_of("pipeline.completed"), 1);
        assert_eq!(sink.events()[0].correlation_id, "abc");
    }

    #[test]
    fn test_noop_sink_discards() {
        let sink = NoOpEventSink;
        sink.try_emit("pipeline.completed", "abc", None);
    }
}
