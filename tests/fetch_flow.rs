//! End-to-end behaviour of a fetch session against test doubles.
//!
//! Covers fresh installs on metered and unmetered networks, each user
//! answer to the network prompt, partially installed roots and repeated
//! runs.

mod support;

use std::path::Path;
use std::sync::Arc;

use envfetch::prelude::*;
use support::{Parked, PathSet, Recording, Scripted, Switchable};
use tokio_test::{assert_pending, assert_ready};

const ROOT: &str = "/data/envfetch";

fn debian_catalog() -> ArtifactCatalog {
    let (catalog, outcome) = ArtifactCatalog::builtin()
        .extend("debian", &DistributionSets::builtin())
        .unwrap();
    assert_eq!(
        outcome,
        Extension::Applied {
            tag: "debian".into(),
            added: 6
        }
    );
    catalog
}

struct Harness {
    existence: Arc<PathSet>,
    connectivity: Arc<Switchable>,
    engine: Arc<Recording>,
}

impl Harness {
    fn new(unmetered: bool) -> Self {
        Self {
            existence: Arc::new(PathSet::default()),
            connectivity: Switchable::new(unmetered),
            engine: Arc::new(Recording::default()),
        }
    }

    fn install(&self, catalog: &ArtifactCatalog, filter: impl Fn(&ArtifactDescriptor) -> bool) {
        for d in catalog.iter().filter(|d| filter(d)) {
            self.existence.mark(d.local_path(Path::new(ROOT)));
        }
    }

    fn session(&self, catalog: ArtifactCatalog, prompt: Arc<dyn ChoicePrompt>) -> FetchSession {
        FetchSession::new(
            catalog,
            RequirementResolver::new(ROOT, self.existence.clone()),
            NetworkGate::new(self.connectivity.clone(), prompt),
            FetchDispatcher::new(self.engine.clone()),
        )
    }
}

fn dispatched(outcome: SessionOutcome) -> DispatchReport {
    match outcome {
        SessionOutcome::Dispatched(report) => report,
        other => panic!("expected dispatch, got {}", other.label()),
    }
}

// =============================================================================
// PLANNING
// =============================================================================

#[test]
fn fresh_install_on_metered_network_needs_confirmation() {
    let h = Harness::new(false);
    let session = h.session(debian_catalog(), Scripted::silent());

    let plan = session.plan().unwrap();
    // six support files, five small debian files, one root archive
    assert_eq!(plan.required.len(), 12);
    assert!(plan.needs_confirmation);
    assert_eq!(plan.required.iter().filter(|d| d.is_large()).count(), 1);
}

#[test]
fn fresh_install_on_unmetered_network_does_not() {
    let h = Harness::new(true);
    let plan = h.session(debian_catalog(), Scripted::silent()).plan().unwrap();
    assert_eq!(plan.required.len(), 12);
    assert!(!plan.needs_confirmation);
}

#[test]
fn installed_root_archive_means_no_confirmation() {
    let h = Harness::new(false);
    let catalog = debian_catalog();
    h.install(&catalog, |d| d.is_large());

    let plan = h.session(catalog, Scripted::silent()).plan().unwrap();
    assert_eq!(plan.required.len(), 11);
    assert!(!plan.needs_confirmation);
    assert_eq!(h.connectivity.queries.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn resolve_is_repeatable_and_keeps_catalog_order() {
    let h = Harness::new(true);
    let catalog = debian_catalog();
    h.install(&catalog, |d| d.id.leaf() == "busybox");
    let resolver = RequirementResolver::new(ROOT, h.existence.clone());

    let first = resolver.resolve(&catalog).unwrap();
    let second = resolver.resolve(&catalog).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 10);

    let order: Vec<_> = catalog
        .iter()
        .filter(|d| first.contains(d))
        .cloned()
        .collect();
    assert_eq!(first, order);
}

// =============================================================================
// CATALOG COMPOSITION
// =============================================================================

#[test]
fn extension_is_base_followed_by_distribution() {
    let base = ArtifactCatalog::builtin();
    let (extended, _) = base.extend("debian", &DistributionSets::builtin()).unwrap();

    let expected: Vec<_> = builtin_base_then_debian();
    assert_eq!(extended.entries(), expected.as_slice());
    // base is untouched
    assert_eq!(base.len(), 6);
}

#[test]
fn unknown_distribution_leaves_catalog_unchanged() {
    let base = ArtifactCatalog::builtin();
    let (same, outcome) = base.extend("alpine", &DistributionSets::builtin()).unwrap();
    assert_eq!(same, base);
    assert_eq!(
        outcome,
        Extension::UnknownDistribution {
            tag: "alpine".into()
        }
    );
}

fn builtin_base_then_debian() -> Vec<ArtifactDescriptor> {
    let mut all = envfetch::catalog::builtin_base();
    all.extend(envfetch::catalog::builtin_debian());
    all
}

// =============================================================================
// SESSIONS
// =============================================================================

#[tokio::test]
async fn everything_present_submits_nothing() {
    let h = Harness::new(false);
    let catalog = debian_catalog();
    h.install(&catalog, |_| true);
    let prompt = Scripted::answering(Choice::First);

    let outcome = h.session(catalog, prompt.clone()).run().await.unwrap();
    assert!(matches!(outcome, SessionOutcome::NothingToFetch));
    assert!(h.engine.requests().is_empty());
    assert_eq!(prompt.times_asked(), 0);
}

#[tokio::test]
async fn unmetered_network_dispatches_without_asking() {
    let h = Harness::new(true);
    let prompt = Scripted::answering(Choice::Third);

    let report = dispatched(h.session(debian_catalog(), prompt.clone()).run().await.unwrap());
    assert!(report.is_complete());
    assert_eq!(report.handles().len(), 12);
    assert_eq!(prompt.times_asked(), 0);
}

#[tokio::test]
async fn small_only_on_metered_network_dispatches_without_asking() {
    let h = Harness::new(false);
    let prompt = Scripted::answering(Choice::Third);

    let report = dispatched(
        h.session(ArtifactCatalog::builtin(), prompt.clone())
            .run()
            .await
            .unwrap(),
    );
    assert_eq!(report.handles().len(), 6);
    assert_eq!(prompt.times_asked(), 0);
}

#[tokio::test]
async fn continue_dispatches_restricted_requests() {
    let h = Harness::new(false);
    let prompt = Scripted::answering(Choice::First);

    let report = dispatched(h.session(debian_catalog(), prompt.clone()).run().await.unwrap());
    assert_eq!(prompt.times_asked(), 1);
    assert_eq!(report.handles().len(), 12);

    let requests = h.engine.requests();
    assert_eq!(requests.len(), 12);
    assert!(requests.iter().all(|r| !r.allow_metered && !r.allow_roaming));
    assert_eq!(requests[0].destination_name, "envfetch:support:proot");
    assert_eq!(requests[11].destination_name, "envfetch:debian:rootfs.tar.gz");
    assert_eq!(requests[11].description, "Downloading debian:rootfs.tar.gz.");

    let labels = prompt.last_labels.lock().unwrap().clone().unwrap();
    assert_eq!(labels[0], "Continue anyway");
}

#[tokio::test]
async fn cancel_submits_nothing() {
    let h = Harness::new(false);
    let outcome = h
        .session(debian_catalog(), Scripted::answering(Choice::Third))
        .run()
        .await
        .unwrap();
    assert!(matches!(outcome, SessionOutcome::Cancelled));
    assert!(h.engine.requests().is_empty());
}

#[tokio::test]
async fn await_better_network_then_rerun() {
    let h = Harness::new(false);
    let prompt = Scripted::answering(Choice::Second);
    let session = h.session(debian_catalog(), prompt.clone());

    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, SessionOutcome::AwaitBetterNetwork));
    assert!(h.engine.requests().is_empty());

    h.connectivity.set_unmetered(true);
    let report = dispatched(session.run().await.unwrap());
    assert_eq!(report.handles().len(), 12);
    assert_eq!(prompt.times_asked(), 1);
}

#[tokio::test]
async fn unanswered_prompt_is_an_error() {
    let h = Harness::new(false);
    let err = h
        .session(debian_catalog(), Scripted::silent())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PromptNotResolved));
    assert!(h.engine.requests().is_empty());
}

#[tokio::test]
async fn refused_submission_is_reported_not_fatal() {
    let h = Harness::new(true);
    h.engine.refuse("support:busybox");

    let report = dispatched(
        h.session(debian_catalog(), Scripted::silent())
            .run()
            .await
            .unwrap(),
    );
    assert_eq!(report.handles().len(), 11);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].artifact.id.to_string(), "support:busybox");
}

#[tokio::test]
async fn repeated_runs_submit_again() {
    let h = Harness::new(true);
    let session = h.session(debian_catalog(), Scripted::silent());

    let first = dispatched(session.run().await.unwrap());
    let second = dispatched(session.run().await.unwrap());
    assert_eq!(h.engine.requests().len(), 24);
    assert_ne!(first.handles(), second.handles());
}

#[test]
fn session_waits_for_the_prompt() {
    let h = Harness::new(false);
    let prompt = Arc::new(Parked::default());
    let session = h.session(debian_catalog(), prompt.clone());

    let mut run = tokio_test::task::spawn(session.run());
    assert_pending!(run.poll());
    assert!(prompt.is_waiting());
    assert!(h.engine.requests().is_empty());

    assert!(prompt.answer(Choice::Third));
    assert!(run.is_woken());
    let outcome = assert_ready!(run.poll()).unwrap();
    assert!(matches!(outcome, SessionOutcome::Cancelled));
    assert!(h.engine.requests().is_empty());
}
