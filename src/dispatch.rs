//! Fan-out of required artifacts to the transfer engine.

use std::sync::Arc;

use tracing::{info, warn};

use crate::artifact::{ArtifactDescriptor, ID_SEPARATOR};
use crate::transfer::{SubmitError, TrackingHandle, TransferEngine, TransferRequest};

/// Prefix of every destination name unless configured otherwise.
pub const DEFAULT_DESTINATION_PREFIX: &str = "envfetch";

/// A request the engine accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTransfer {
    pub artifact: ArtifactDescriptor,
    pub handle: TrackingHandle,
}

/// A request the engine refused.
#[derive(Debug)]
pub struct FailedSubmission {
    pub artifact: ArtifactDescriptor,
    pub error: SubmitError,
}

/// Result of one dispatch call. Both lists keep required-set order.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub queued: Vec<QueuedTransfer>,
    pub failed: Vec<FailedSubmission>,
}

impl DispatchReport {
    /// Handles of accepted transfers, in required-set order.
    pub fn handles(&self) -> Vec<TrackingHandle> {
        self.queued.iter().map(|q| q.handle).collect()
    }

    /// True when every artifact was accepted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The subset to hand back to `dispatch` for a retry.
    pub fn failed_artifacts(&self) -> Vec<ArtifactDescriptor> {
        self.failed.iter().map(|f| f.artifact.clone()).collect()
    }
}

/// Turns descriptors into transfer requests and submits them.
///
/// Every request forbids metered and roaming networks; this is fixed
/// policy. Dispatch is not idempotent: submitting an overlapping set twice
/// enqueues the overlap twice.
#[derive(Clone)]
pub struct FetchDispatcher {
    engine: Arc<dyn TransferEngine>,
    destination_prefix: String,
}

impl FetchDispatcher {
    pub fn new(engine: Arc<dyn TransferEngine>) -> Self {
        Self {
            engine,
            destination_prefix: DEFAULT_DESTINATION_PREFIX.to_string(),
        }
    }

    pub fn destination_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.destination_prefix = prefix.into();
        self
    }

    /// Name the engine stores `artifact` under: `<prefix>:<namespace>:<leaf>`.
    pub fn destination_name(&self, artifact: &ArtifactDescriptor) -> String {
        format!(
            "{}{}{}",
            self.destination_prefix, ID_SEPARATOR, artifact.id
        )
    }

    pub fn request_for(&self, artifact: &ArtifactDescriptor) -> TransferRequest {
        TransferRequest {
            source: artifact.source.clone(),
            namespace: artifact.id.namespace().to_string(),
            leaf: artifact.id.leaf().to_string(),
            label: artifact.id.to_string(),
            description: format!("Downloading {}.", artifact.id),
            destination_name: self.destination_name(artifact),
            allow_metered: false,
            allow_roaming: false,
        }
    }

    /// Submit one request per artifact and collect the handles.
    ///
    /// A refused submission does not stop the batch; it lands in
    /// [`DispatchReport::failed`]. Returns without waiting for transfers.
    pub async fn dispatch(&self, required: &[ArtifactDescriptor]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for artifact in required {
            match self.engine.submit(self.request_for(artifact)).await {
                Ok(handle) => {
                    info!(artifact = %artifact.id, handle = %handle, "transfer submitted");
                    report.queued.push(QueuedTransfer {
                        artifact: artifact.clone(),
                        handle,
                    });
                }
                Err(error) => {
                    warn!(artifact = %artifact.id, error = %error, "transfer submission failed");
                    report.failed.push(FailedSubmission {
                        artifact: artifact.clone(),
                        error,
                    });
                }
            }
        }

        if !report.failed.is_empty() {
            warn!(
                queued = report.queued.len(),
                failed = report.failed.len(),
                "dispatch partially failed"
            );
        }
        report
    }
}
