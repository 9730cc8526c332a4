//! Network gating for large downloads.
//!
//! The gate decides whether fetching may proceed silently. When the active
//! network is metered and the required set holds a large artifact, it asks a
//! human through a [`ChoicePrompt`] and waits for the answer.
//!
//! The exchange with the prompt is an explicit request/response: the gate
//! sends a [`PromptRequest`] that owns a single-use [`Responder`], then awaits
//! the matching `oneshot` receiver. Resolving consumes the responder, so a
//! prompt cannot answer twice. A prompt that drops the responder without
//! answering is reported as [`Error::PromptNotResolved`].
//!
//! ```text
//! NotEvaluated ──(no confirmation needed)──▶ Proceed
//!      │
//!      └──(metered + large)──▶ AwaitingChoice ──▶ Continue | AwaitBetterNetwork | Cancel
//! ```
//!
//! There is no timeout on `AwaitingChoice`.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::artifact::ArtifactDescriptor;
use crate::oracle::ConnectivityOracle;
use crate::{Error, Result};

/// Outcome of asking the user about an unfavorable network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkDecision {
    /// Fetch on the current network anyway.
    Continue,
    /// Send the user to change connectivity, then retry.
    AwaitBetterNetwork,
    /// Abandon the fetch.
    Cancel,
}

/// Terminal state of one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// No confirmation was needed.
    Proceed,
    /// The user was asked and chose.
    Decided(NetworkDecision),
}

impl GateOutcome {
    /// Whether the caller may go on to dispatch.
    pub fn may_dispatch(self) -> bool {
        matches!(
            self,
            GateOutcome::Proceed | GateOutcome::Decided(NetworkDecision::Continue)
        )
    }
}

/// One of the three options offered by a prompt, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    First,
    Second,
    Third,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::First, Choice::Second, Choice::Third];

    pub fn index(self) -> usize {
        match self {
            Choice::First => 0,
            Choice::Second => 1,
            Choice::Third => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    fn decision(self) -> NetworkDecision {
        match self {
            Choice::First => NetworkDecision::Continue,
            Choice::Second => NetworkDecision::AwaitBetterNetwork,
            Choice::Third => NetworkDecision::Cancel,
        }
    }
}

/// Single-use reply channel handed to a prompt.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Choice>,
}

impl Responder {
    /// Deliver the user's choice. Returns `false` if the gate stopped waiting.
    pub fn resolve(self, choice: Choice) -> bool {
        self.tx.send(choice).is_ok()
    }
}

/// What the prompt should show, plus the channel for the answer.
#[derive(Debug)]
pub struct PromptRequest {
    pub title: String,
    pub message: String,
    /// Labels for [`Choice::First`], [`Choice::Second`], [`Choice::Third`].
    pub labels: [String; 3],
    pub responder: Responder,
}

/// Presents three choices to a human.
///
/// Implementations must resolve the request's responder exactly once.
/// Dismissal without a choice has to be prevented by the prompt itself.
pub trait ChoicePrompt: Send + Sync {
    fn present(&self, request: PromptRequest);
}

/// Text shown when asking about a metered network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptWording {
    pub title: String,
    pub message: String,
    pub labels: [String; 3],
}

impl Default for PromptWording {
    fn default() -> Self {
        Self {
            title: "Unmetered network unavailable".to_string(),
            message: "A large download is required and the active network is metered. \
                      Downloading now may incur data charges."
                .to_string(),
            labels: [
                "Continue anyway".to_string(),
                "Switch network".to_string(),
                "Cancel".to_string(),
            ],
        }
    }
}

/// Three-way network gate.
#[derive(Clone)]
pub struct NetworkGate {
    connectivity: Arc<dyn ConnectivityOracle>,
    prompt: Arc<dyn ChoicePrompt>,
    wording: PromptWording,
}

impl NetworkGate {
    pub fn new(connectivity: Arc<dyn ConnectivityOracle>, prompt: Arc<dyn ChoicePrompt>) -> Self {
        Self {
            connectivity,
            prompt,
            wording: PromptWording::default(),
        }
    }

    pub fn wording(mut self, wording: PromptWording) -> Self {
        self.wording = wording;
        self
    }

    /// True iff the network is metered and `required` holds a large artifact.
    ///
    /// Connectivity is only consulted when a large artifact is present.
    pub fn needs_confirmation(&self, required: &[ArtifactDescriptor]) -> Result<bool> {
        let Some(large) = required.iter().find(|d| d.is_large()) else {
            return Ok(false);
        };
        let unmetered = self.connectivity.is_unmetered()?;
        debug!(artifact = %large.id, unmetered, "large artifact pending");
        Ok(!unmetered)
    }

    /// Ask the user and wait for the single answer.
    pub async fn decide(&self) -> Result<NetworkDecision> {
        let (tx, rx) = oneshot::channel();
        let request = PromptRequest {
            title: self.wording.title.clone(),
            message: self.wording.message.clone(),
            labels: self.wording.labels.clone(),
            responder: Responder { tx },
        };

        info!("metered network, awaiting user decision");
        self.prompt.present(request);

        let choice = rx.await.map_err(|_| Error::PromptNotResolved)?;
        let decision = choice.decision();
        info!(?choice, ?decision, "user decided");
        Ok(decision)
    }

    /// Run the gate state machine to a terminal outcome.
    pub async fn evaluate(&self, required: &[ArtifactDescriptor]) -> Result<GateOutcome> {
        if self.needs_confirmation(required)? {
            Ok(GateOutcome::Decided(self.decide().await?))
        } else {
            Ok(GateOutcome::Proceed)
        }
    }
}
