//! Triggers: the inbound delivery mechanisms that drive the pipeline.

mod http;
mod messagebus;

pub use http::{HttpTrigger, TRIGGER_PATH};
pub use messagebus::MessageBusTrigger;

use crate::errors::EdgeflowError;
use crate::events::EventSink;
use async_trait::async_trait;
use std::sync::Arc;

/// A live inbound delivery mechanism.
///
/// On successful initialization the trigger invokes the pipeline runtime
/// for every qualifying arrival until shutdown. Startup failures are fatal
/// to the trigger; per-arrival failures are not.
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Starts the trigger.
    async fn initialize(&self, sink: Arc<dyn EventSink>) -> Result<(), EdgeflowError>;

    /// Signals shutdown and waits for in-flight work to settle.
    async fn shutdown(&self);
}
