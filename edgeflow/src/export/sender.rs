//! Broker-publishing terminal stage.

use super::broker::{qos_level, BrokerClient, RumqttBrokerClient};
use super::{tls, BrokerAddress, ExportOptions};
use crate::context::ExecutionContext;
use crate::core::{StageOutcome, StageValue};
use crate::errors::EdgeflowError;
use crate::stages::TransformStage;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Publishes pipeline payloads to a broker topic.
///
/// Connects on demand, waits for the publish to be acknowledged, then
/// best-effort-marks the source event as pushed. Any failure drops this
/// arrival only; the next invocation starts over.
pub struct MqttSender {
    client: Arc<dyn BrokerClient>,
    topic: String,
    options: ExportOptions,
    guard: Mutex<()>,
}

impl fmt::Debug for MqttSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSender")
            .field("topic", &self.topic)
            .field("options", &self.options)
            .finish()
    }
}

impl MqttSender {
    /// Creates a sender for the given broker address.
    ///
    /// TLS-bearing protocols (`tcps`, `ssl`, `tls`) require a readable
    /// certificate/key pair; a load failure yields no sender and must be
    /// treated as a fatal configuration error by the caller.
    pub fn new(
        addr: &BrokerAddress,
        cert_file: Option<&Path>,
        key_file: Option<&Path>,
        options: ExportOptions,
    ) -> Result<Self, EdgeflowError> {
        qos_level(options.qos)?;
        if addr.publisher.is_empty() {
            return Err(EdgeflowError::Configuration(
                "publisher id must not be empty".to_string(),
            ));
        }

        let tls_config = if addr.is_tls() {
            let (Some(cert_file), Some(key_file)) = (cert_file, key_file) else {
                return Err(EdgeflowError::Initialization(
                    "tls protocol configured without a certificate/key pair".to_string(),
                ));
            };
            let (certs, key) = tls::load_client_identity(cert_file, key_file)?;
            Some(Arc::new(tls::client_config(
                certs,
                key,
                options.verify_certificates,
            )?))
        } else {
            None
        };

        let client = RumqttBrokerClient::new(addr, &options, tls_config);
        Ok(Self {
            client: Arc::new(client),
            topic: addr.topic.clone(),
            options,
            guard: Mutex::new(()),
        })
    }

    /// Creates a sender over an existing connection handle.
    #[must_use]
    pub fn with_client(
        client: Arc<dyn BrokerClient>,
        topic: impl Into<String>,
        options: ExportOptions,
    ) -> Self {
        Self {
            client,
            topic: topic.into(),
            options,
            guard: Mutex::new(()),
        }
    }
}

#[async_trait]
impl TransformStage for MqttSender {
    fn name(&self) -> &str {
        "mqtt-export"
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome {
        // the absent-input check runs before any connect attempt
        let Some(value) = input else {
            return StageOutcome::fail_with(&EdgeflowError::NoData);
        };

        // serializes connect-check-then-publish across runs sharing this
        // stage instance
        let _guard = self.guard.lock().await;

        if !self.client.is_connected().await {
            info!(
                correlation_id = %ctx.correlation_id(),
                topic = %self.topic,
                "connecting to broker"
            );
            if let Err(err) = self.client.connect().await {
                return StageOutcome::fail(err.to_string());
            }
            info!(correlation_id = %ctx.correlation_id(), "connected to broker");
        }

        let payload = match value {
            StageValue::Text(text) => text.into_bytes(),
            StageValue::Bytes(bytes) => bytes,
            other => {
                return StageOutcome::fail_with(&EdgeflowError::UnexpectedType(
                    other.kind().to_string(),
                ))
            }
        };

        if let Err(err) = self
            .client
            .publish(&self.topic, self.options.qos, self.options.retain, &payload)
            .await
        {
            return StageOutcome::fail(err.to_string());
        }

        info!(
            correlation_id = %ctx.correlation_id(),
            topic = %self.topic,
            bytes = payload.len(),
            "exported payload to broker"
        );
        ctx.sink().try_emit(
            "export.sent",
            ctx.correlation_id(),
            Some(serde_json::json!({
                "topic": self.topic,
                "bytes": payload.len(),
            })),
        );
        ctx.mark_as_pushed().await;

        StageOutcome::ok_empty()
    }
}
