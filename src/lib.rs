//! envfetch: Resolve, gate and dispatch the artifacts of a runnable environment
//!
//! An environment is assembled from a catalog of named artifacts (support
//! binaries, scripts, a root filesystem archive). envfetch works out which of
//! them are missing locally, checks whether the network is fit for the large
//! ones, asks the user when it is not, and hands one transfer request per
//! missing artifact to a transfer engine.
//!
//! # Key Pieces
//!
//! - **Catalog**: immutable composition of a base set plus a distribution set
//! - **Resolver**: presence-based filtering through an [`ExistenceOracle`]
//! - **Gate**: metered-network check with a single suspension for user input
//! - **Dispatcher**: fan-out to a [`TransferEngine`], partial failures reported
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use envfetch::prelude::*;
//! use envfetch_queue::DownloadQueue;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let (catalog, _) = ArtifactCatalog::builtin().extend("debian", &DistributionSets::builtin())?;
//!
//!     let connectivity = Arc::new(SysfsConnectivity::default());
//!     let queue = DownloadQueue::builder("/tmp/envfetch/downloads")
//!         .network_probe(network_probe(connectivity.clone()))
//!         .build()?;
//!
//!     let session = FetchSession::new(
//!         catalog,
//!         RequirementResolver::new("/tmp/envfetch", Arc::new(FsExistence)),
//!         NetworkGate::new(connectivity, Arc::new(TerminalPrompt::stdio())),
//!         FetchDispatcher::new(Arc::new(QueueEngine::new(queue))),
//!     );
//!
//!     match session.run().await? {
//!         SessionOutcome::Dispatched(report) => println!("queued {}", report.handles().len()),
//!         other => println!("{:?}", other),
//!     }
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod oracle;
pub mod prompt;
pub mod resolve;
pub mod session;
pub mod transfer;

// Re-exports for convenience
pub use error::{Error, Result};
pub use oracle::{ConnectivityOracle, ExistenceOracle};
pub use transfer::TransferEngine;

// Prelude for common imports
pub mod prelude {
    pub use crate::artifact::{ArtifactDescriptor, ArtifactId, SizeClass};
    pub use crate::catalog::{ArtifactCatalog, DistributionSets, Extension};
    pub use crate::dispatch::{DispatchReport, FetchDispatcher};
    pub use crate::error::{Error, Result};
    pub use crate::gate::{Choice, ChoicePrompt, GateOutcome, NetworkDecision, NetworkGate, PromptRequest};
    pub use crate::oracle::{
        ConnectivityOracle, ExistenceOracle, FixedConnectivity, FsExistence, SysfsConnectivity,
    };
    pub use crate::prompt::TerminalPrompt;
    pub use crate::resolve::RequirementResolver;
    pub use crate::session::{FetchPlan, FetchSession, SessionOutcome};
    pub use crate::transfer::{network_probe, QueueEngine, TrackingHandle, TransferEngine, TransferRequest};
}
