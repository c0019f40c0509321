//! # Edgeflow
//!
//! An edge-computing event pipeline SDK.
//!
//! Inbound data events (delivered over HTTP or a publish/subscribe bus)
//! run through an ordered sequence of transform stages; a per-event
//! context threads correlation metadata through the chain and carries the
//! run's output back to its trigger. Edgeflow provides:
//!
//! - **Pipeline execution**: ordered stages with short-circuit semantics
//! - **Triggers**: HTTP request/response and bus-subscription delivery
//! - **Built-in transforms**: device filtering, XML/JSON encoding,
//!   compression
//! - **Broker export**: a terminal stage publishing output over MQTT with
//!   connect-on-demand and acknowledgement waits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use edgeflow::prelude::*;
//!
//! let mut service = EdgeflowService::new("simple-filter-xml");
//! service.initialize(None, None)?;
//! service.set_pipeline(vec![
//!     Arc::new(DeviceNameFilter::new(vec!["Random-Float-Device".into()])),
//!     Arc::new(XmlTransform::new()),
//! ]);
//! service.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod bus;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod export;
pub mod observability;
pub mod pipeline;
pub mod service;
pub mod shutdown;
pub mod stages;
pub mod store;
pub mod trigger;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bus::{BusSubscription, MemoryMessageBus, MessageBusClient, MqttMessageBus};
    pub use crate::config::{AppConfiguration, BindingConfig, MessageBusConfig, TriggerKind};
    pub use crate::context::ExecutionContext;
    pub use crate::core::{
        Event, MessageEnvelope, Reading, StageOutcome, StageStatus, StageValue,
    };
    pub use crate::errors::EdgeflowError;
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::export::{BrokerAddress, BrokerClient, ExportOptions, MqttSender};
    pub use crate::pipeline::PipelineRuntime;
    pub use crate::service::EdgeflowService;
    pub use crate::shutdown::ShutdownToken;
    pub use crate::stages::{
        DeviceNameFilter, FnStage, GzipCompressor, JsonTransform, TransformStage,
        ValueDescriptorFilter, XmlTransform, ZlibCompressor,
    };
    pub use crate::store::{HttpStoreClient, StoreClient};
    pub use crate::trigger::{HttpTrigger, MessageBusTrigger, Trigger};
}
