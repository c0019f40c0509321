//! SDK facade tying configuration, pipeline, and trigger together.

use crate::bus::MqttMessageBus;
use crate::config::{self, AppConfiguration, TriggerKind};
use crate::errors::EdgeflowError;
use crate::events::{EventSink, LoggingEventSink};
use crate::observability;
use crate::pipeline::PipelineRuntime;
use crate::shutdown::ShutdownToken;
use crate::stages::TransformStage;
use crate::store::StoreClient;
use crate::trigger::{HttpTrigger, MessageBusTrigger, Trigger};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The top-level service: owns the configuration, the stage pipeline, and
/// the configured trigger.
pub struct EdgeflowService {
    service_key: String,
    configuration: AppConfiguration,
    stages: Vec<Arc<dyn TransformStage>>,
    store: Option<Arc<dyn StoreClient>>,
    trigger: Option<Box<dyn Trigger>>,
    shutdown: ShutdownToken,
}

impl EdgeflowService {
    /// Creates a service with the given key and a default configuration.
    #[must_use]
    pub fn new(service_key: impl Into<String>) -> Self {
        Self {
            service_key: service_key.into(),
            configuration: AppConfiguration::default(),
            stages: Vec::new(),
            store: None,
            trigger: None,
            shutdown: ShutdownToken::new(),
        }
    }

    /// Loads configuration from disk and installs logging.
    pub fn initialize(
        &mut self,
        profile: Option<&str>,
        config_dir: Option<&Path>,
    ) -> Result<(), EdgeflowError> {
        self.configuration = config::load(profile, config_dir)?;
        observability::init_logging(&self.service_key, &self.configuration.logging.level)?;
        info!(service = %self.service_key, "service initialized");
        Ok(())
    }

    /// Replaces the configuration, for embedded use without a config file.
    pub fn set_configuration(&mut self, configuration: AppConfiguration) {
        self.configuration = configuration;
    }

    /// Returns the loaded configuration.
    #[must_use]
    pub fn configuration(&self) -> &AppConfiguration {
        &self.configuration
    }

    /// Returns the application-specific settings.
    #[must_use]
    pub fn application_settings(&self) -> &HashMap<String, String> {
        &self.configuration.application_settings
    }

    /// Sets the ordered stage sequence executed for every arrival.
    pub fn set_pipeline(&mut self, stages: Vec<Arc<dyn TransformStage>>) {
        self.stages = stages;
    }

    /// Attaches the upstream store client.
    pub fn set_store(&mut self, store: Arc<dyn StoreClient>) {
        self.store = Some(store);
    }

    /// Returns the token that stops `run`.
    #[must_use]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Builds the configured trigger, starts it, and parks until the
    /// shutdown token fires.
    pub async fn run(&mut self) -> Result<(), EdgeflowError> {
        if self.stages.is_empty() {
            return Err(EdgeflowError::Configuration(
                "no pipeline configured, call set_pipeline first".to_string(),
            ));
        }
        let runtime = Arc::new(PipelineRuntime::new(self.stages.clone()));
        let sink: Arc<dyn EventSink> = Arc::new(LoggingEventSink::default());

        let trigger: Box<dyn Trigger> = match self.configuration.binding.trigger {
            TriggerKind::Http => {
                let address = format!(
                    "{}:{}",
                    self.configuration.service.host, self.configuration.service.port
                );
                let mut trigger = HttpTrigger::new(runtime, address);
                if let Some(store) = &self.store {
                    trigger = trigger.with_store(store.clone());
                }
                Box::new(trigger)
            }
            TriggerKind::MessageBus => {
                let bus = Arc::new(MqttMessageBus::new(&self.configuration.message_bus)?);
                let mut trigger = MessageBusTrigger::new(
                    runtime,
                    bus,
                    self.configuration.binding.subscribe_topic.clone(),
                    self.configuration.binding.publish_topic.clone(),
                );
                if let Some(store) = &self.store {
                    trigger = trigger.with_store(store.clone());
                }
                Box::new(trigger)
            }
        };

        trigger.initialize(sink).await?;
        self.trigger = Some(trigger);
        info!(service = %self.service_key, "service running");

        self.shutdown.cancelled().await;
        if let Some(trigger) = self.trigger.take() {
            trigger.shutdown().await;
        }
        info!(service = %self.service_key, "service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::stages::JsonTransform;
    use std::time::Duration;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_run_without_pipeline_is_a_configuration_error() {
        let mut service = EdgeflowService::new("test-service");

        let err = service.run().await.unwrap_err();

        assert!(matches!(err, EdgeflowError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_run_serves_until_shutdown() {
        let mut service = EdgeflowService::new("test-service");
        let mut configuration = AppConfiguration::default();
        configuration.service = ServiceConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        service.set_configuration(configuration);
        service.set_pipeline(vec![Arc::new(JsonTransform::new())]);
        let token = service.shutdown_token();

        let runner = tokio::spawn(async move { service.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.shutdown("test over");

        let result = tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("stops in time")
            .expect("join");
        tokio_test::assert_ok!(result);
    }
}
