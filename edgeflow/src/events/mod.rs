//! Pipeline event sinks for observability.

mod sink;

pub use sink::{CollectedEvent, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
