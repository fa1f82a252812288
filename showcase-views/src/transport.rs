//! Delivery transports for view batches.
//!
//! Two strategies reach the batch endpoint:
//!
//! - [`BeaconTransport`]: queues a multipart form post on the runtime and
//!   returns at once. Cannot report whether the server accepted the batch;
//!   [`ViewTransport::settle`] waits for the posts still in flight.
//! - [`KeepAliveTransport`]: awaits a JSON post and checks the status.
//!
//! [`TransportSelector`] probes each transport's availability at call time
//! and uses the first one that can take the batch.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONNECTION};
use serde::{Deserialize, Serialize};
use showcase_core::{DeliveryError, WorkId};
use tokio::task::JoinHandle;

use crate::config::ViewTrackingConfig;

/// Form field (multipart) and object key (JSON) carrying the id list.
pub const WORKS_FIELD: &str = "works";

/// JSON body of a batch delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub works: Vec<WorkId>,
}

/// A way of getting a batch of ids to the ingestion endpoint.
#[async_trait]
pub trait ViewTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Capability probe, evaluated at each flush.
    fn is_available(&self) -> bool;

    /// Deliver `ids`. `Ok` means handed off; for fire-and-forget transports
    /// that is all it means.
    async fn send(&self, ids: &[WorkId]) -> Result<(), DeliveryError>;

    /// Whether `Ok` from [`send`](Self::send) means the server accepted the batch.
    fn confirms_delivery(&self) -> bool {
        true
    }

    /// Wait for deliveries this transport still has in flight.
    async fn settle(&self) {}
}

fn encode_ids(transport: &str, ids: &[WorkId]) -> Result<String, DeliveryError> {
    serde_json::to_string(ids).map_err(|e| DeliveryError::SendFailed {
        transport: transport.to_string(),
        reason: e.to_string(),
    })
}

// ============================================================================
// BEACON
// ============================================================================

/// Fire-and-forget multipart delivery.
#[derive(Debug, Clone)]
pub struct BeaconTransport {
    client: reqwest::Client,
    endpoint: String,
    enabled: bool,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BeaconTransport {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            enabled: true,
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Posts spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|h| !h.is_finished());
        in_flight.len()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl ViewTransport for BeaconTransport {
    fn name(&self) -> &'static str {
        "beacon"
    }

    fn is_available(&self) -> bool {
        self.enabled && tokio::runtime::Handle::try_current().is_ok()
    }

    async fn send(&self, ids: &[WorkId]) -> Result<(), DeliveryError> {
        let payload = encode_ids(self.name(), ids)?;
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| DeliveryError::TransportUnavailable)?;

        let request = self
            .client
            .post(&self.endpoint)
            .multipart(reqwest::multipart::Form::new().text(WORKS_FIELD, payload));
        let count = ids.len();

        let post = handle.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(status = %response.status(), count, "beacon batch rejected");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, count, "beacon batch not delivered"),
            }
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(post);
        Ok(())
    }

    fn confirms_delivery(&self) -> bool {
        false
    }

    async fn settle(&self) {
        let in_flight =
            std::mem::take(&mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner));
        for post in in_flight {
            if let Err(e) = post.await {
                tracing::debug!(error = %e, "beacon post did not finish");
            }
        }
    }
}

// ============================================================================
// KEEP-ALIVE
// ============================================================================

/// Awaited JSON delivery over a persistent connection.
#[derive(Debug, Clone)]
pub struct KeepAliveTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl KeepAliveTransport {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ViewTransport for KeepAliveTransport {
    fn name(&self) -> &'static str {
        "keep-alive"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn send(&self, ids: &[WorkId]) -> Result<(), DeliveryError> {
        let body = BatchPayload { works: ids.to_vec() };
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONNECTION, HeaderValue::from_static("keep-alive"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::SendFailed {
                transport: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Ordered list of transports, most preferred first.
#[derive(Clone, Default)]
pub struct TransportSelector {
    transports: Vec<Arc<dyn ViewTransport>>,
}

impl std::fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.transports.iter().map(|t| t.name()).collect();
        f.debug_struct("TransportSelector").field("transports", &names).finish()
    }
}

impl TransportSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Beacon first (when enabled), keep-alive as the fallback.
    pub fn standard(config: &ViewTrackingConfig) -> Self {
        let client = reqwest::Client::new();
        Self::new()
            .with(BeaconTransport::new(client.clone(), &config.endpoint).with_enabled(config.beacon_enabled))
            .with(KeepAliveTransport::new(client, &config.endpoint))
    }

    /// Append a transport with lower preference than those already added.
    pub fn with(self, transport: impl ViewTransport + 'static) -> Self {
        self.with_arc(Arc::new(transport))
    }

    pub fn with_arc(mut self, transport: Arc<dyn ViewTransport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// First transport currently available.
    pub fn select(&self) -> Option<&Arc<dyn ViewTransport>> {
        self.transports.iter().find(|t| t.is_available())
    }

    /// Deliver through the first available transport, moving on to the next
    /// one only when a transport turns out to be unavailable mid-send.
    /// Returns the name of the transport that took the batch.
    pub async fn deliver(&self, ids: &[WorkId]) -> Result<&'static str, DeliveryError> {
        self.deliver_through(ids, false).await
    }

    /// Like [`deliver`](Self::deliver), restricted to transports that wait
    /// for the server to accept the batch.
    pub async fn deliver_confirmed(&self, ids: &[WorkId]) -> Result<&'static str, DeliveryError> {
        self.deliver_through(ids, true).await
    }

    /// Wait for every transport's in-flight deliveries.
    pub async fn settle(&self) {
        for transport in &self.transports {
            transport.settle().await;
        }
    }

    async fn deliver_through(
        &self,
        ids: &[WorkId],
        confirmed_only: bool,
    ) -> Result<&'static str, DeliveryError> {
        let candidates = self
            .transports
            .iter()
            .filter(|t| t.is_available() && (!confirmed_only || t.confirms_delivery()));
        for transport in candidates {
            match transport.send(ids).await {
                Ok(()) => return Ok(transport.name()),
                Err(DeliveryError::TransportUnavailable) => {
                    tracing::debug!(transport = transport.name(), "transport unavailable, trying next");
                }
                Err(e) => return Err(e),
            }
        }
        Err(DeliveryError::TransportUnavailable)
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}
