//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use envfetch::gate::{Choice, ChoicePrompt, PromptRequest};
use envfetch::transfer::{SubmitError, TrackingHandle, TransferEngine, TransferRequest};
use envfetch::{ConnectivityOracle, ExistenceOracle, Result};

/// Existence oracle over an in-memory set of paths.
#[derive(Default)]
pub struct PathSet {
    present: Mutex<HashSet<PathBuf>>,
    pub queries: AtomicUsize,
}

impl PathSet {
    pub fn mark(&self, path: impl Into<PathBuf>) {
        self.present.lock().unwrap().insert(path.into());
    }
}

impl ExistenceOracle for PathSet {
    fn exists(&self, path: &Path) -> Result<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.present.lock().unwrap().contains(path))
    }
}

/// Connectivity that can be flipped mid-test; counts how often it is asked.
pub struct Switchable {
    unmetered: AtomicBool,
    pub queries: AtomicUsize,
}

impl Switchable {
    pub fn new(unmetered: bool) -> Arc<Self> {
        Arc::new(Self {
            unmetered: AtomicBool::new(unmetered),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn set_unmetered(&self, unmetered: bool) {
        self.unmetered.store(unmetered, Ordering::SeqCst);
    }
}

impl ConnectivityOracle for Switchable {
    fn is_unmetered(&self) -> Result<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.unmetered.load(Ordering::SeqCst))
    }
}

/// Prompt that answers with a scripted choice, or drops the responder when
/// there is none.
pub struct Scripted {
    choice: Option<Choice>,
    pub asked: AtomicUsize,
    pub last_labels: Mutex<Option<[String; 3]>>,
}

impl Scripted {
    pub fn answering(choice: Choice) -> Arc<Self> {
        Self::build(Some(choice))
    }

    pub fn silent() -> Arc<Self> {
        Self::build(None)
    }

    fn build(choice: Option<Choice>) -> Arc<Self> {
        Arc::new(Self {
            choice,
            asked: AtomicUsize::new(0),
            last_labels: Mutex::new(None),
        })
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ChoicePrompt for Scripted {
    fn present(&self, request: PromptRequest) {
        self.asked.fetch_add(1, Ordering::SeqCst);
        *self.last_labels.lock().unwrap() = Some(request.labels.clone());
        if let Some(choice) = self.choice {
            request.responder.resolve(choice);
        }
    }
}

/// Prompt that parks the responder until the test resolves it.
#[derive(Default)]
pub struct Parked {
    pending: Mutex<Option<envfetch::gate::Responder>>,
}

impl Parked {
    pub fn answer(&self, choice: Choice) -> bool {
        match self.pending.lock().unwrap().take() {
            Some(responder) => responder.resolve(choice),
            None => false,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.lock().unwrap().is_some()
    }
}

impl ChoicePrompt for Parked {
    fn present(&self, request: PromptRequest) {
        *self.pending.lock().unwrap() = Some(request.responder);
    }
}

/// Transfer engine that records requests and hands out sequential handles.
#[derive(Default)]
pub struct Recording {
    requests: Mutex<Vec<TransferRequest>>,
    next: AtomicU64,
    refuse: Mutex<HashSet<String>>,
}

impl Recording {
    pub fn refuse(&self, label: &str) {
        self.refuse.lock().unwrap().insert(label.to_string());
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.label).collect()
    }
}

#[async_trait]
impl TransferEngine for Recording {
    async fn submit(&self, request: TransferRequest) -> std::result::Result<TrackingHandle, SubmitError> {
        if self.refuse.lock().unwrap().contains(&request.label) {
            return Err(SubmitError::new("engine refused"));
        }
        self.requests.lock().unwrap().push(request);
        Ok(TrackingHandle::new(self.next.fetch_add(1, Ordering::SeqCst) + 1))
    }
}
