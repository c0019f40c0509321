//! Message bus client abstraction and implementations.

mod memory;
mod mqtt;

pub use memory::MemoryMessageBus;
pub use mqtt::MqttMessageBus;

use crate::core::MessageEnvelope;
use crate::errors::EdgeflowError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Queue capacity for a subscription's arrival and error channels.
pub(crate) const SUBSCRIPTION_DEPTH: usize = 64;

/// The inbound queues produced by a subscription.
pub struct BusSubscription {
    /// Arrivals delivered on the subscribed topic, in delivery order.
    pub arrivals: mpsc::Receiver<MessageEnvelope>,
    /// Asynchronous bus errors (delivery failures, decode failures).
    pub errors: mpsc::Receiver<EdgeflowError>,
}

/// A publish/subscribe transport carrying message envelopes.
#[async_trait]
pub trait MessageBusClient: Send + Sync {
    /// Subscribes to a topic, producing an arrival queue and an error
    /// queue.
    async fn subscribe(&self, topic: &str) -> Result<BusSubscription, EdgeflowError>;

    /// Publishes an envelope to a topic.
    async fn publish(&self, envelope: MessageEnvelope, topic: &str) -> Result<(), EdgeflowError>;
}
