//! Upstream event store client.
//!
//! The pipeline needs exactly one thing from the store: marking a source
//! event as consumed once its data has been exported.

use crate::errors::EdgeflowError;
use async_trait::async_trait;

/// Marks source events as pushed in the upstream store.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Marks the event with the given id as pushed.
    async fn mark_pushed(&self, event_id: &str) -> Result<(), EdgeflowError>;

    /// Marks the event with the given content checksum as pushed.
    async fn mark_pushed_by_checksum(&self, checksum: &str) -> Result<(), EdgeflowError>;
}

/// HTTP implementation talking to the store's REST surface.
#[derive(Debug, Clone)]
pub struct HttpStoreClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStoreClient {
    /// Creates a client for the store at `base_url`
    /// (e.g. `http://localhost:48080`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    async fn put(&self, path: &str) -> Result<(), EdgeflowError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .put(&url)
            .send()
            .await
            .map_err(|err| EdgeflowError::Store(err.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(EdgeflowError::Store(format!(
                "{url} returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn mark_pushed(&self, event_id: &str) -> Result<(), EdgeflowError> {
        self.put(&format!("/api/v1/event/id/{event_id}/pushed")).await
    }

    async fn mark_pushed_by_checksum(&self, checksum: &str) -> Result<(), EdgeflowError> {
        self.put(&format!("/api/v1/event/checksum/{checksum}")).await
    }
}
