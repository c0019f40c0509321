//! MQTT-backed message bus client.
//!
//! Envelopes travel as JSON on the wire. The event-loop driver forwards
//! broker errors to every subscription's error queue and keeps polling, so
//! the underlying client reconnects on its own.

use super::{BusSubscription, MessageBusClient, SUBSCRIPTION_DEPTH};
use crate::config::MessageBusConfig;
use crate::core::MessageEnvelope;
use crate::errors::EdgeflowError;
use crate::export::qos_level;
use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event as MqttEvent, EventLoop, Incoming, MqttOptions, QoS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT implementation of the message bus.
pub struct MqttMessageBus {
    client: AsyncClient,
    qos: QoS,
    routes: Arc<Mutex<HashMap<String, Route>>>,
}

struct Route {
    arrivals: mpsc::Sender<MessageEnvelope>,
    errors: mpsc::Sender<EdgeflowError>,
}

impl MqttMessageBus {
    /// Creates the bus client and starts its event-loop driver.
    pub fn new(config: &MessageBusConfig) -> Result<Self, EdgeflowError> {
        let qos = qos_level(config.qos)?;
        if config.client_id.is_empty() {
            return Err(EdgeflowError::Configuration(
                "message bus client id must not be empty".to_string(),
            ));
        }
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, event_loop) = AsyncClient::new(options, SUBSCRIPTION_DEPTH);
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::default();
        tokio::spawn(drive(event_loop, routes.clone()));
        debug!(host = %config.host, port = config.port, "configured mqtt message bus");

        Ok(Self { client, qos, routes })
    }
}

#[async_trait]
impl MessageBusClient for MqttMessageBus {
    async fn subscribe(&self, topic: &str) -> Result<BusSubscription, EdgeflowError> {
        let (arrivals_tx, arrivals_rx) = mpsc::channel(SUBSCRIPTION_DEPTH);
        let (errors_tx, errors_rx) = mpsc::channel(SUBSCRIPTION_DEPTH);
        self.routes.lock().insert(
            topic.to_string(),
            Route {
                arrivals: arrivals_tx,
                errors: errors_tx,
            },
        );
        self.client
            .subscribe(topic, self.qos)
            .await
            .map_err(|err| EdgeflowError::MessageBus(err.to_string()))?;
        Ok(BusSubscription {
            arrivals: arrivals_rx,
            errors: errors_rx,
        })
    }

    async fn publish(&self, envelope: MessageEnvelope, topic: &str) -> Result<(), EdgeflowError> {
        let payload = envelope.to_wire()?;
        self.client
            .publish(topic, self.qos, false, payload)
            .await
            .map_err(|err| EdgeflowError::MessageBus(err.to_string()))
    }
}

async fn drive(mut event_loop: EventLoop, routes: Arc<Mutex<HashMap<String, Route>>>) {
    loop {
        match event_loop.poll().await {
            Ok(MqttEvent::Incoming(Incoming::Publish(publish))) => {
                let route = routes
                    .lock()
                    .get(&publish.topic)
                    .map(|route| (route.arrivals.clone(), route.errors.clone()));
                let Some((arrivals, errors)) = route else {
                    continue;
                };
                match MessageEnvelope::from_wire(&publish.payload) {
                    Ok(envelope) => {
                        let _ = arrivals.send(envelope).await;
                    }
                    Err(err) => {
                        let _ = errors.send(err).await;
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                let senders: Vec<mpsc::Sender<EdgeflowError>> = routes
                    .lock()
                    .values()
                    .map(|route| route.errors.clone())
                    .collect();
                for tx in senders {
                    // never let a full error queue stall the event loop
                    let _ = tx.try_send(EdgeflowError::MessageBus(err.to_string()));
                }
                // the event loop reconnects on the next poll
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
