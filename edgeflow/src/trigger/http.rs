//! HTTP request/response trigger.

use super::Trigger;
use crate::context::ExecutionContext;
use crate::core::{MessageEnvelope, CONTENT_TYPE_JSON, CORRELATION_HEADER};
use crate::errors::EdgeflowError;
use crate::events::EventSink;
use crate::pipeline::PipelineRuntime;
use crate::shutdown::ShutdownToken;
use crate::store::StoreClient;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Path accepting inbound events.
pub const TRIGGER_PATH: &str = "/api/v1/trigger";

/// Drives the pipeline from inbound HTTP requests.
///
/// Every request runs with an independent execution context; the trigger
/// imposes no serialization beyond what the serving layer provides. The
/// pipeline output (when set) becomes the response body; runs without
/// output answer with no content.
pub struct HttpTrigger {
    runtime: Arc<PipelineRuntime>,
    bind_address: String,
    store: Option<Arc<dyn StoreClient>>,
    shutdown: ShutdownToken,
    server: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl HttpTrigger {
    /// Creates a trigger serving on `bind_address`
    /// (e.g. `0.0.0.0:48095`).
    #[must_use]
    pub fn new(runtime: Arc<PipelineRuntime>, bind_address: impl Into<String>) -> Self {
        Self {
            runtime,
            bind_address: bind_address.into(),
            store: None,
            shutdown: ShutdownToken::new(),
            server: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Attaches the upstream store client handed to each execution
    /// context.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StoreClient>) -> Self {
        self.store = Some(store);
        self
    }

    /// Returns the token that stops the server.
    #[must_use]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// The address the server is listening on, once initialized.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

#[derive(Clone)]
struct TriggerState {
    runtime: Arc<PipelineRuntime>,
    store: Option<Arc<dyn StoreClient>>,
    sink: Arc<dyn EventSink>,
}

#[async_trait]
impl Trigger for HttpTrigger {
    async fn initialize(&self, sink: Arc<dyn EventSink>) -> Result<(), EdgeflowError> {
        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .map_err(|err| {
                EdgeflowError::Initialization(format!(
                    "failed to bind {}: {err}",
                    self.bind_address
                ))
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| EdgeflowError::Initialization(err.to_string()))?;
        *self.local_addr.lock() = Some(local_addr);
        info!(address = %local_addr, "http trigger listening");

        let state = TriggerState {
            runtime: self.runtime.clone(),
            store: self.store.clone(),
            sink,
        };
        let app = Router::new()
            .route(TRIGGER_PATH, post(handle_trigger))
            .with_state(state);

        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(err) = serve.await {
                error!(error = %err, "http trigger server error");
            }
        });
        *self.server.lock() = Some(handle);
        Ok(())
    }

    async fn shutdown(&self) {
        self.shutdown.shutdown("trigger shutdown requested");
        let handle = self.server.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(error = %err, "http trigger exited abnormally");
            }
        }
    }
}

async fn handle_trigger(
    State(state): State<TriggerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    debug!(
        correlation_id = %correlation_id,
        bytes = body.len(),
        "received http arrival"
    );

    let mut ctx = ExecutionContext::new(correlation_id).with_sink(state.sink.clone());
    if let Some(store) = &state.store {
        ctx = ctx.with_store(store.clone());
    }

    let envelope = MessageEnvelope::new(ctx.correlation_id(), body.to_vec(), CONTENT_TYPE_JSON);
    if let Err(err) = state.runtime.process_event(&ctx, &envelope).await {
        error!(
            correlation_id = %ctx.correlation_id(),
            error = %err,
            "failed to decode http arrival"
        );
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }

    match ctx.take_output() {
        Some(payload) => {
            let content_type = ctx.response_content_type();
            ([(header::CONTENT_TYPE, content_type)], payload).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
