//! Message-bus subscription trigger.

use super::Trigger;
use crate::bus::{BusSubscription, MessageBusClient};
use crate::context::ExecutionContext;
use crate::core::MessageEnvelope;
use crate::errors::EdgeflowError;
use crate::events::EventSink;
use crate::pipeline::PipelineRuntime;
use crate::shutdown::ShutdownToken;
use crate::store::StoreClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Drives the pipeline from a bus subscription.
///
/// A single dedicated worker owns the arrival and error queues for the
/// lifetime of the trigger and services them in strict delivery order;
/// a slow pipeline run backpressures the subscription. Output-producing
/// runs publish an outbound envelope to the configured topic, at most
/// once: publish failures are logged and dropped.
pub struct MessageBusTrigger {
    runtime: Arc<PipelineRuntime>,
    bus: Arc<dyn MessageBusClient>,
    subscribe_topic: String,
    publish_topic: String,
    store: Option<Arc<dyn StoreClient>>,
    shutdown: ShutdownToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MessageBusTrigger {
    /// Creates a trigger over the given bus client and topics.
    #[must_use]
    pub fn new(
        runtime: Arc<PipelineRuntime>,
        bus: Arc<dyn MessageBusClient>,
        subscribe_topic: impl Into<String>,
        publish_topic: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            bus,
            subscribe_topic: subscribe_topic.into(),
            publish_topic: publish_topic.into(),
            store: None,
            shutdown: ShutdownToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Attaches the upstream store client handed to each execution
    /// context.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StoreClient>) -> Self {
        self.store = Some(store);
        self
    }

    /// Returns the shutdown token shared with the worker.
    #[must_use]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }
}

#[async_trait]
impl Trigger for MessageBusTrigger {
    async fn initialize(&self, sink: Arc<dyn EventSink>) -> Result<(), EdgeflowError> {
        info!(
            subscribe_topic = %self.subscribe_topic,
            publish_topic = %self.publish_topic,
            "initializing message bus trigger"
        );
        let subscription = self.bus.subscribe(&self.subscribe_topic).await.map_err(|err| {
            EdgeflowError::Initialization(format!(
                "failed to subscribe to {}: {err}",
                self.subscribe_topic
            ))
        })?;

        let worker = Worker {
            runtime: self.runtime.clone(),
            bus: self.bus.clone(),
            publish_topic: self.publish_topic.clone(),
            store: self.store.clone(),
            sink,
            shutdown: self.shutdown.clone(),
        };
        let handle = tokio::spawn(worker.run(subscription));
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    async fn shutdown(&self) {
        self.shutdown.shutdown("trigger shutdown requested");
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(error = %err, "bus worker exited abnormally");
            }
        }
    }
}

struct Worker {
    runtime: Arc<PipelineRuntime>,
    bus: Arc<dyn MessageBusClient>,
    publish_topic: String,
    store: Option<Arc<dyn StoreClient>>,
    sink: Arc<dyn EventSink>,
    shutdown: ShutdownToken,
}

impl Worker {
    /// Services both queues until shutdown.
    ///
    /// Bus errors are logged and the worker keeps going; the subscription
    /// stays up. On shutdown, arrivals already queued are drained before
    /// the worker exits.
    async fn run(self, mut subscription: BusSubscription) {
        let mut errors_open = true;
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    while let Ok(envelope) = subscription.arrivals.try_recv() {
                        self.handle_arrival(envelope).await;
                    }
                    debug!(
                        reason = %self.shutdown.reason().unwrap_or_default(),
                        "bus worker stopped"
                    );
                    return;
                }
                err = subscription.errors.recv(), if errors_open => {
                    match err {
                        Some(err) => error!(error = %err, "message bus reported an error"),
                        None => errors_open = false,
                    }
                }
                envelope = subscription.arrivals.recv() => {
                    match envelope {
                        Some(envelope) => self.handle_arrival(envelope).await,
                        None => {
                            debug!("arrival queue closed, bus worker exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_arrival(&self, envelope: MessageEnvelope) {
        debug!(correlation_id = %envelope.correlation_id, "received message from bus");

        let mut ctx = ExecutionContext::new(envelope.correlation_id.clone())
            .with_sink(self.sink.clone());
        if let Some(store) = &self.store {
            ctx = ctx.with_store(store.clone());
        }

        if let Err(err) = self.runtime.process_event(&ctx, &envelope).await {
            error!(
                correlation_id = %envelope.correlation_id,
                error = %err,
                "failed to process arrival"
            );
            return;
        }

        let Some(payload) = ctx.take_output() else {
            return;
        };
        let outbound =
            MessageEnvelope::new(ctx.correlation_id(), payload, ctx.response_content_type());
        match self.bus.publish(outbound, &self.publish_topic).await {
            Ok(()) => debug!(
                correlation_id = %ctx.correlation_id(),
                topic = %self.publish_topic,
                "published pipeline output to bus"
            ),
            Err(err) => error!(
                correlation_id = %ctx.correlation_id(),
                error = %err,
                "failed to publish pipeline output, dropping"
            ),
        }
    }
}
