//! In-process message bus for tests and embedded deployments.

use super::{BusSubscription, MessageBusClient, SUBSCRIPTION_DEPTH};
use crate::core::MessageEnvelope;
use crate::errors::EdgeflowError;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Topic fan-out over in-process channels.
///
/// Every subscription on a topic receives its own copy of each published
/// envelope. Closed subscriptions are dropped silently.
#[derive(Debug, Default)]
pub struct MemoryMessageBus {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
}

#[derive(Debug)]
struct Subscriber {
    arrivals: mpsc::Sender<MessageEnvelope>,
    errors: mpsc::Sender<EdgeflowError>,
}

impl MemoryMessageBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an error notification to every subscription on the topic.
    pub async fn inject_error(&self, topic: &str, message: impl Into<String>) {
        let senders: Vec<mpsc::Sender<EdgeflowError>> = self
            .subscribers
            .lock()
            .get(topic)
            .map(|subs| subs.iter().map(|sub| sub.errors.clone()).collect())
            .unwrap_or_default();
        let message = message.into();
        join_all(
            senders
                .iter()
                .map(|tx| tx.send(EdgeflowError::MessageBus(message.clone()))),
        )
        .await;
    }
}

#[async_trait]
impl MessageBusClient for MemoryMessageBus {
    async fn subscribe(&self, topic: &str) -> Result<BusSubscription, EdgeflowError> {
        let (arrivals_tx, arrivals_rx) = mpsc::channel(SUBSCRIPTION_DEPTH);
        let (errors_tx, errors_rx) = mpsc::channel(SUBSCRIPTION_DEPTH);
        self.subscribers
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber {
                arrivals: arrivals_tx,
                errors: errors_tx,
            });
        Ok(BusSubscription {
            arrivals: arrivals_rx,
            errors: errors_rx,
        })
    }

    async fn publish(&self, envelope: MessageEnvelope, topic: &str) -> Result<(), EdgeflowError> {
        let senders: Vec<mpsc::Sender<MessageEnvelope>> = self
            .subscribers
            .lock()
            .get(topic)
            .map(|subs| subs.iter().map(|sub| sub.arrivals.clone()).collect())
            .unwrap_or_default();
        join_all(senders.iter().map(|tx| tx.send(envelope.clone()))).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CONTENT_TYPE_JSON;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = MemoryMessageBus::new();
        let mut first = bus.subscribe("events").await.expect("subscribe");
        let mut second = bus.subscribe("events").await.expect("subscribe");

        let envelope = MessageEnvelope::new("abc", b"payload".to_vec(), CONTENT_TYPE_JSON);
        bus.publish(envelope.clone(), "events").await.expect("publish");

        assert_eq!(first.arrivals.recv().await, Some(envelope.clone()));
        assert_eq!(second.arrivals.recv().await, Some(envelope));
    }

    #[tokio::test]
    async fn test_publish_to_unknown_topic_is_dropped() {
        let bus = MemoryMessageBus::new();
        let envelope = MessageEnvelope::new("abc", Vec::new(), CONTENT_TYPE_JSON);
        bus.publish(envelope, "nobody-listens").await.expect("publish");
    }

    #[tokio::test]
    async fn test_injected_errors_reach_the_error_queue() {
        let bus = MemoryMessageBus::new();
        let mut subscription = bus.subscribe("events").await.expect("subscribe");

        bus.inject_error("events", "socket reset").await;

        let err = subscription.errors.recv().await.expect("error");
        assert!(matches!(err, EdgeflowError::MessageBus(_)));
    }
}
