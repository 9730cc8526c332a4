//! Seam to the transfer engine that actually moves bytes.
//!
//! The core only submits [`TransferRequest`]s and keeps the returned
//! [`TrackingHandle`]s. [`QueueEngine`] adapts the bundled
//! [`envfetch_queue::DownloadQueue`] to this seam.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use envfetch_queue::{DownloadId, DownloadQueue, DownloadRequest, DownloadStatus, NetworkClass};
use tracing::warn;

use crate::oracle::ConnectivityOracle;

/// Opaque identifier of a submitted transfer, issued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingHandle(u64);

impl TrackingHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the engine needs to fetch and store one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: String,
    pub namespace: String,
    pub leaf: String,
    /// Artifact id, for display.
    pub label: String,
    pub description: String,
    /// Namespaced file name the engine stores the bytes under.
    pub destination_name: String,
    pub allow_metered: bool,
    pub allow_roaming: bool,
}

/// The engine refused a request.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct SubmitError {
    reason: String,
}

impl SubmitError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<envfetch_queue::QueueError> for SubmitError {
    fn from(e: envfetch_queue::QueueError) -> Self {
        Self::new(e.to_string())
    }
}

/// External transfer engine.
///
/// `submit` acknowledges without waiting for bytes to move; the transfer
/// itself is not observed by the caller.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    async fn submit(&self, request: TransferRequest) -> Result<TrackingHandle, SubmitError>;
}

/// [`TransferEngine`] backed by an in-process [`DownloadQueue`].
#[derive(Clone)]
pub struct QueueEngine {
    queue: DownloadQueue,
}

impl QueueEngine {
    pub fn new(queue: DownloadQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    pub fn status(&self, handle: TrackingHandle) -> Option<DownloadStatus> {
        self.queue.status(DownloadId::from(handle.get()))
    }

    /// Wait for the transfer behind `handle` to complete or fail.
    pub async fn wait(&self, handle: TrackingHandle) -> Option<DownloadStatus> {
        self.queue.wait(DownloadId::from(handle.get())).await
    }
}

#[async_trait]
impl TransferEngine for QueueEngine {
    async fn submit(&self, request: TransferRequest) -> Result<TrackingHandle, SubmitError> {
        let download = DownloadRequest::new(request.source, request.destination_name)
            .description(request.description)
            .allow_metered(request.allow_metered)
            .allow_roaming(request.allow_roaming);
        let id = self.queue.enqueue(download)?;
        Ok(TrackingHandle::new(id.as_u64()))
    }
}

/// Network probe for the queue built on a connectivity oracle.
///
/// An oracle failure is treated as metered so restricted transfers hold
/// rather than run on an unknown network.
pub fn network_probe(
    oracle: Arc<dyn ConnectivityOracle>,
) -> impl Fn() -> NetworkClass + Send + Sync + 'static {
    move || match oracle.is_unmetered() {
        Ok(true) => NetworkClass::Unmetered,
        Ok(false) => NetworkClass::Metered,
        Err(e) => {
            warn!(error = %e, "connectivity unknown, treating as metered");
            NetworkClass::Metered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::FixedConnectivity;
    use crate::{Error, Result};

    struct Unreachable;

    impl ConnectivityOracle for Unreachable {
        fn is_unmetered(&self) -> Result<bool> {
            Err(Error::oracle("connectivity", "gone"))
        }
    }

    fn request(name: &str) -> TransferRequest {
        TransferRequest {
            source: "https://example.com/busybox".into(),
            namespace: "debian".into(),
            leaf: "busybox".into(),
            label: "debian:busybox".into(),
            description: "Downloading debian:busybox.".into(),
            destination_name: name.into(),
            allow_metered: false,
            allow_roaming: false,
        }
    }

    #[test]
    fn probe_maps_oracle_answers() {
        assert_eq!(
            network_probe(Arc::new(FixedConnectivity::unmetered()))(),
            NetworkClass::Unmetered
        );
        assert_eq!(
            network_probe(Arc::new(FixedConnectivity::metered()))(),
            NetworkClass::Metered
        );
        assert_eq!(network_probe(Arc::new(Unreachable))(), NetworkClass::Metered);
    }

    #[tokio::test]
    async fn queue_engine_hands_out_queue_ids() {
        let tmp = tempfile::tempdir().unwrap();
        // metered: requests stay held, so nothing touches the network
        let queue = DownloadQueue::builder(tmp.path())
            .network_probe(|| NetworkClass::Metered)
            .build()
            .unwrap();
        let engine = QueueEngine::new(queue);

        let first = engine.submit(request("envfetch:debian:busybox")).await.unwrap();
        let second = engine.submit(request("envfetch:debian:busybox")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(
            engine.queue().ids(),
            vec![DownloadId::from(first.get()), DownloadId::from(second.get())]
        );
        assert!(engine.status(first).is_some());
    }

    #[tokio::test]
    async fn queue_rejection_becomes_submit_error() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = QueueEngine::new(DownloadQueue::builder(tmp.path()).build().unwrap());
        let err = engine.submit(request("debian/busybox")).await.unwrap_err();
        assert!(err.reason().contains("path separators"), "{err}");
    }
}
