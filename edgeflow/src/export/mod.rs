//! Broker export: addressing, options, client, and the publishing stage.

mod broker;
mod sender;
mod tls;

pub use broker::{BrokerClient, RumqttBrokerClient};
pub use sender::MqttSender;

pub(crate) use broker::qos_level;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerAddress {
    /// Transport protocol (e.g. "tcp", "tcps", "ssl", "tls").
    pub protocol: String,

    /// Broker host name or IP address.
    pub address: String,

    /// Broker port.
    pub port: u16,

    /// Optional path suffix for the endpoint.
    #[serde(default)]
    pub path: String,

    /// Client identifier presented to the broker.
    #[serde(default)]
    pub publisher: String,

    /// User name, empty when the broker is unauthenticated.
    #[serde(default)]
    pub user: String,

    /// Password, empty when the broker is unauthenticated.
    #[serde(default)]
    pub password: String,

    /// Topic pipeline output is published to.
    pub topic: String,
}

impl BrokerAddress {
    /// Derives the connection endpoint `protocol://address:port/path`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.protocol.to_lowercase(),
            self.address,
            self.port,
            self.path
        )
    }

    /// Whether the configured protocol carries TLS.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(
            self.protocol.to_lowercase().as_str(),
            "tcps" | "ssl" | "tls"
        )
    }
}

/// Configuration for a broker-publishing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Quality-of-service level (0, 1 or 2).
    #[serde(default)]
    pub qos: u8,

    /// Whether published messages carry the retain flag.
    #[serde(default)]
    pub retain: bool,

    /// Whether the client reconnects to the broker on its own.
    #[serde(default)]
    pub auto_reconnect: bool,

    /// Whether the broker's certificate chain is verified on TLS
    /// endpoints. Disabling this reproduces legacy behavior and must be
    /// an explicit decision.
    #[serde(default = "default_verify_certificates")]
    pub verify_certificates: bool,

    /// Bound on a single connect wait, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Bound on a single publish acknowledgement wait, in seconds.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_seconds: u64,
}

fn default_verify_certificates() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_publish_timeout() -> u64 {
    10
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            qos: 0,
            retain: false,
            auto_reconnect: false,
            verify_certificates: default_verify_certificates(),
            connect_timeout_seconds: default_connect_timeout(),
            publish_timeout_seconds: default_publish_timeout(),
        }
    }
}

impl ExportOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quality-of-service level for all messages.
    #[must_use]
    pub fn with_qos(mut self, qos: u8) -> Self {
        self.qos = qos;
        self
    }

    /// Enables or disables the retain flag.
    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Enables or disables automatic client reconnection.
    #[must_use]
    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    /// Enables or disables server certificate verification.
    #[must_use]
    pub fn with_verify_certificates(mut self, verify: bool) -> Self {
        self.verify_certificates = verify;
        self
    }

    /// Gets the connect bound as a duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Gets the publish bound as a duration.
    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_seconds)
    }
}
