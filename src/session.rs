//! One fetch session: resolve, gate, dispatch.

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::artifact::ArtifactDescriptor;
use crate::catalog::ArtifactCatalog;
use crate::dispatch::{DispatchReport, FetchDispatcher};
use crate::gate::{GateOutcome, NetworkDecision, NetworkGate};
use crate::resolve::RequirementResolver;
use crate::Result;

/// What a session would do, computed without asking anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub required: Vec<ArtifactDescriptor>,
    pub needs_confirmation: bool,
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Every artifact is already present.
    NothingToFetch,
    /// The user cancelled; nothing was submitted.
    Cancelled,
    /// The user wants to change networks first; nothing was submitted.
    AwaitBetterNetwork,
    /// Transfers were submitted.
    Dispatched(DispatchReport),
}

/// Owns a composed catalog and the components that act on it.
///
/// `run` dispatches at most once per call. Calling it again after
/// [`SessionOutcome::AwaitBetterNetwork`] re-resolves first, but transfers
/// still in flight from an earlier `Dispatched` run are not deduplicated.
pub struct FetchSession {
    id: Uuid,
    catalog: ArtifactCatalog,
    resolver: RequirementResolver,
    gate: NetworkGate,
    dispatcher: FetchDispatcher,
}

impl FetchSession {
    pub fn new(
        catalog: ArtifactCatalog,
        resolver: RequirementResolver,
        gate: NetworkGate,
        dispatcher: FetchDispatcher,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            catalog,
            resolver,
            gate,
            dispatcher,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn catalog(&self) -> &ArtifactCatalog {
        &self.catalog
    }

    pub fn plan(&self) -> Result<FetchPlan> {
        let _span = info_span!("fetch_plan", session = %self.id).entered();
        let required = self.resolver.resolve(&self.catalog)?;
        let needs_confirmation = self.gate.needs_confirmation(&required)?;
        Ok(FetchPlan {
            required,
            needs_confirmation,
        })
    }

    pub async fn run(&self) -> Result<SessionOutcome> {
        let span = info_span!("fetch_session", session = %self.id);
        async {
            let required = self.resolver.resolve(&self.catalog)?;
            if required.is_empty() {
                info!("all artifacts present");
                return Ok(SessionOutcome::NothingToFetch);
            }

            let outcome = match self.gate.evaluate(&required).await? {
                GateOutcome::Decided(NetworkDecision::Cancel) => SessionOutcome::Cancelled,
                GateOutcome::Decided(NetworkDecision::AwaitBetterNetwork) => {
                    SessionOutcome::AwaitBetterNetwork
                }
                GateOutcome::Proceed | GateOutcome::Decided(NetworkDecision::Continue) => {
                    SessionOutcome::Dispatched(self.dispatcher.dispatch(&required).await)
                }
            };
            info!(outcome = outcome.label(), "session finished");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }
}

impl SessionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::NothingToFetch => "nothing_to_fetch",
            SessionOutcome::Cancelled => "cancelled",
            SessionOutcome::AwaitBetterNetwork => "await_better_network",
            SessionOutcome::Dispatched(_) => "dispatched",
        }
    }
}
