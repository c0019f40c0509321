//! Broker client abstraction and the rumqttc-backed implementation.

use super::{BrokerAddress, ExportOptions};
use crate::errors::EdgeflowError;
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event as MqttEvent, EventLoop, Incoming, MqttOptions,
    Outgoing, QoS, TlsConfiguration, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

const EVENT_CHANNEL_DEPTH: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Maps a numeric quality-of-service level onto the client's QoS type.
pub(crate) fn qos_level(qos: u8) -> Result<QoS, EdgeflowError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(EdgeflowError::Configuration(format!(
            "invalid qos level {other}, expected 0, 1 or 2"
        ))),
    }
}

/// The connection handle a publishing stage drives.
///
/// One handle is shared across every invocation of a stage instance and
/// must tolerate sequential reuse.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Whether the client currently holds a live connection.
    async fn is_connected(&self) -> bool;

    /// Establishes a connection, blocking until the attempt resolves.
    async fn connect(&self) -> Result<(), EdgeflowError>;

    /// Publishes a payload, blocking until the attempt resolves:
    /// acknowledged for qos 1/2, handed to the transport for qos 0.
    async fn publish(
        &self,
        topic: &str,
        qos: u8,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), EdgeflowError>;
}

/// Connection-lifecycle notifications relayed from the event-loop driver.
#[derive(Debug, Clone)]
enum DriverEvent {
    Connected,
    PublishQueued(u16),
    Acknowledged(u16),
    Disconnected(String),
}

struct Driver {
    client: AsyncClient,
    connected: watch::Receiver<bool>,
    events: broadcast::Sender<DriverEvent>,
    task: JoinHandle<()>,
}

/// rumqttc-backed broker client.
///
/// The event loop runs on a background task spawned by the first
/// successful connect; connect and publish waits observe notifications
/// relayed from that task and are bounded by the configured timeouts.
pub struct RumqttBrokerClient {
    options: MqttOptions,
    auto_reconnect: bool,
    connect_timeout: Duration,
    publish_timeout: Duration,
    driver: Mutex<Option<Driver>>,
    publish_serial: Mutex<()>,
}

impl RumqttBrokerClient {
    /// Builds a client for the given broker address.
    ///
    /// The address's publisher id must be non-empty.
    #[must_use]
    pub fn new(
        addr: &BrokerAddress,
        export_options: &ExportOptions,
        tls_config: Option<Arc<rustls::ClientConfig>>,
    ) -> Self {
        let mut options = MqttOptions::new(addr.publisher.clone(), addr.address.clone(), addr.port);
        options.set_keep_alive(Duration::from_secs(30));
        if !addr.user.is_empty() {
            options.set_credentials(addr.user.clone(), addr.password.clone());
        }
        if let Some(config) = tls_config {
            options.set_transport(Transport::Tls(TlsConfiguration::Rustls(config)));
        }
        debug!(endpoint = %addr.endpoint(), "configured broker client");

        Self {
            options,
            auto_reconnect: export_options.auto_reconnect,
            connect_timeout: export_options.connect_timeout(),
            publish_timeout: export_options.publish_timeout(),
            driver: Mutex::new(None),
            publish_serial: Mutex::new(()),
        }
    }
}

#[async_trait]
impl BrokerClient for RumqttBrokerClient {
    async fn is_connected(&self) -> bool {
        let guard = self.driver.lock().await;
        guard
            .as_ref()
            .is_some_and(|driver| *driver.connected.borrow())
    }

    async fn connect(&self) -> Result<(), EdgeflowError> {
        let mut guard = self.driver.lock().await;
        if let Some(driver) = guard.as_ref() {
            if *driver.connected.borrow() {
                return Ok(());
            }
        }
        // start from scratch on every attempt
        if let Some(old) = guard.take() {
            old.task.abort();
        }

        let (client, event_loop) = AsyncClient::new(self.options.clone(), EVENT_CHANNEL_DEPTH);
        let (connected_tx, connected_rx) = watch::channel(false);
        let (events_tx, mut events_rx) = broadcast::channel(EVENT_CHANNEL_DEPTH);
        let task = tokio::spawn(drive(
            event_loop,
            connected_tx,
            events_tx.clone(),
            self.auto_reconnect,
        ));
        let driver = Driver {
            client,
            connected: connected_rx,
            events: events_tx,
            task,
        };

        let attempt = timeout(self.connect_timeout, async {
            loop {
                match events_rx.recv().await {
                    Ok(DriverEvent::Connected) => return Ok(()),
                    Ok(DriverEvent::Disconnected(reason)) => {
                        return Err(EdgeflowError::Connect(reason))
                    }
                    Ok(_) => {}
                    Err(_) => {
                        return Err(EdgeflowError::Connect("event loop stopped".to_string()))
                    }
                }
            }
        })
        .await;

        match attempt {
            Ok(Ok(())) => {
                *guard = Some(driver);
                Ok(())
            }
            Ok(Err(err)) => {
                driver.task.abort();
                Err(err)
            }
            Err(_) => {
                driver.task.abort();
                Err(EdgeflowError::Connect(format!(
                    "no acknowledgement within {:?}",
                    self.connect_timeout
                )))
            }
        }
    }

    async fn publish(
        &self,
        topic: &str,
        qos: u8,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), EdgeflowError> {
        let level = qos_level(qos).map_err(|err| EdgeflowError::Publish(err.to_string()))?;

        // one acknowledgement wait at a time keeps packet ids unambiguous
        let _serial = self.publish_serial.lock().await;
        let guard = self.driver.lock().await;
        let Some(driver) = guard.as_ref() else {
            return Err(EdgeflowError::Publish("not connected".to_string()));
        };

        let mut events = driver.events.subscribe();
        driver
            .client
            .publish(topic, level, retain, payload)
            .await
            .map_err(|err| EdgeflowError::Publish(err.to_string()))?;

        if level == QoS::AtMostOnce {
            return Ok(());
        }

        let wait = timeout(self.publish_timeout, async {
            let mut pkid = None;
            loop {
                match events.recv().await {
                    Ok(DriverEvent::PublishQueued(id)) if pkid.is_none() => pkid = Some(id),
                    Ok(DriverEvent::Acknowledged(id)) if Some(id) == pkid => return Ok(()),
                    Ok(DriverEvent::Disconnected(reason)) => {
                        return Err(EdgeflowError::Publish(reason))
                    }
                    Ok(_) => {}
                    Err(_) => {
                        return Err(EdgeflowError::Publish("event loop stopped".to_string()))
                    }
                }
            }
        })
        .await;

        match wait {
            Ok(result) => result,
            Err(_) => Err(EdgeflowError::Publish(format!(
                "no acknowledgement within {:?}",
                self.publish_timeout
            ))),
        }
    }
}

async fn drive(
    mut event_loop: EventLoop,
    connected: watch::Sender<bool>,
    events: broadcast::Sender<DriverEvent>,
    auto_reconnect: bool,
) {
    loop {
        match event_loop.poll().await {
            Ok(MqttEvent::Incoming(Incoming::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    let _ = connected.send(true);
                    let _ = events.send(DriverEvent::Connected);
                } else {
                    let _ = connected.send(false);
                    let _ = events.send(DriverEvent::Disconnected(format!(
                        "broker refused connection: {:?}",
                        ack.code
                    )));
                    if !auto_reconnect {
                        return;
                    }
                }
            }
            Ok(MqttEvent::Incoming(Incoming::PubAck(ack))) => {
                let _ = events.send(DriverEvent::Acknowledged(ack.pkid));
            }
            Ok(MqttEvent::Incoming(Incoming::PubComp(comp))) => {
                let _ = events.send(DriverEvent::Acknowledged(comp.pkid));
            }
            Ok(MqttEvent::Outgoing(Outgoing::Publish(pkid))) => {
                let _ = events.send(DriverEvent::PublishQueued(pkid));
            }
            Ok(_) => {}
            Err(err) => {
                let _ = connected.send(false);
                let _ = events.send(DriverEvent::Disconnected(err.to_string()));
                if !auto_reconnect {
                    return;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_level_mapping() {
        assert_eq!(qos_level(0).expect("qos 0"), QoS::AtMostOnce);
        assert_eq!(qos_level(1).expect("qos 1"), QoS::AtLeastOnce);
        assert_eq!(qos_level(2).expect("qos 2"), QoS::ExactlyOnce);
        assert!(qos_level(3).is_err());
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_broker_fails() {
        let addr = BrokerAddress {
            protocol: "tcp".to_string(),
            address: "127.0.0.1".to_string(),
            port: 1, // nothing listens here
            path: String::new(),
            publisher: "test".to_string(),
            user: String::new(),
            password: String::new(),
            topic: "events".to_string(),
        };
        let mut options = ExportOptions::default();
        options.connect_timeout_seconds = 2;
        let client = RumqttBrokerClient::new(&addr, &options, None);

        assert!(!client.is_connected().await);
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, EdgeflowError::Connect(_)));
        assert!(!client.is_connected().await);
    }
}
