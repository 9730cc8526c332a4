use crate::error::{QueueError, Result};
use crate::request::{DownloadRequest, NetworkClass};
use futures_util::StreamExt;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_USER_AGENT: &str = "envfetch-queue/0.1";

/// Reports the class of the currently active network.
pub type NetworkProbe = Arc<dyn Fn() -> NetworkClass + Send + Sync>;

/// Identifier of an enqueued download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadId(u64);

impl DownloadId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for DownloadId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a single download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Accepted, not started yet.
    Pending,
    /// Held back because the active network class is not permitted.
    WaitingForNetwork,
    /// Bytes are flowing.
    Running { bytes: u64 },
    /// File is in place under the download directory.
    Completed { path: PathBuf, bytes: u64 },
    /// Transfer gave up. Failed downloads are never retried.
    Failed { reason: String },
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed { .. } | DownloadStatus::Failed { .. }
        )
    }
}

/// Builder for [`DownloadQueue`].
pub struct DownloadQueueBuilder {
    download_dir: PathBuf,
    probe: Option<NetworkProbe>,
    poll_interval: Duration,
    user_agent: String,
}

impl DownloadQueueBuilder {
    /// Function consulted before each transfer starts. Defaults to a probe
    /// that always reports [`NetworkClass::Unmetered`].
    pub fn network_probe(
        mut self,
        probe: impl Fn() -> NetworkClass + Send + Sync + 'static,
    ) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    /// How often a held-back download re-checks the network.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<DownloadQueue> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .build()?;
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(|| NetworkClass::Unmetered));

        Ok(DownloadQueue {
            inner: Arc::new(Inner {
                client,
                download_dir: self.download_dir,
                probe,
                poll_interval: self.poll_interval,
                next_id: AtomicU64::new(0),
                downloads: Mutex::new(HashMap::new()),
            }),
        })
    }
}

/// Background download queue.
///
/// Every enqueued request runs on its own tokio task; `enqueue` returns as
/// soon as the task is spawned. Cloning the queue shares its state.
#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    download_dir: PathBuf,
    probe: NetworkProbe,
    poll_interval: Duration,
    next_id: AtomicU64,
    downloads: Mutex<HashMap<DownloadId, Arc<watch::Sender<DownloadStatus>>>>,
}

impl DownloadQueue {
    pub fn builder(download_dir: impl Into<PathBuf>) -> DownloadQueueBuilder {
        DownloadQueueBuilder {
            download_dir: download_dir.into(),
            probe: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Directory that receives completed downloads.
    pub fn download_dir(&self) -> &Path {
        &self.inner.download_dir
    }

    /// Accept `request` and start it in the background.
    ///
    /// Must be called from within a tokio runtime. Identical requests are
    /// not coalesced: each call produces a separate download.
    pub fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId> {
        let url = request.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| QueueError::NoRuntime)?;

        let id = DownloadId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, _rx) = watch::channel(DownloadStatus::Pending);
        let status = Arc::new(tx);
        self.inner.lock_downloads().insert(id, status.clone());

        info!(
            id = %id,
            url = %url,
            file = %request.file_name,
            description = %request.description,
            "download enqueued",
        );

        runtime.spawn(run_download(self.inner.clone(), id, url, request, status));
        Ok(id)
    }

    /// Snapshot of the status of `id`, or `None` if the id is unknown.
    pub fn status(&self, id: DownloadId) -> Option<DownloadStatus> {
        self.inner
            .lock_downloads()
            .get(&id)
            .map(|status| status.borrow().clone())
    }

    /// Wait until `id` reaches a terminal status.
    pub async fn wait(&self, id: DownloadId) -> Option<DownloadStatus> {
        let mut rx = self.inner.lock_downloads().get(&id)?.subscribe();
        let status = rx.wait_for(DownloadStatus::is_terminal).await.ok()?;
        Some(status.clone())
    }

    /// Ids of every download still tracked, in enqueue order.
    ///
    /// Finished downloads stay tracked until [`forget`](Self::forget) or
    /// [`prune`](Self::prune) drops them.
    pub fn ids(&self) -> Vec<DownloadId> {
        let mut ids: Vec<_> = self.inner.lock_downloads().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Stop tracking `id` if it has completed or failed.
    ///
    /// Returns `false` for unknown ids and for downloads still in progress.
    pub fn forget(&self, id: DownloadId) -> bool {
        let mut downloads = self.inner.lock_downloads();
        let terminal = downloads
            .get(&id)
            .is_some_and(|status| status.borrow().is_terminal());
        if terminal {
            downloads.remove(&id);
        }
        terminal
    }

    /// Stop tracking every completed or failed download. Returns how many
    /// were dropped.
    pub fn prune(&self) -> usize {
        let mut downloads = self.inner.lock_downloads();
        let before = downloads.len();
        downloads.retain(|_, status| !status.borrow().is_terminal());
        let dropped = before - downloads.len();
        if dropped > 0 {
            debug!(dropped, remaining = downloads.len(), "pruned finished downloads");
        }
        dropped
    }
}

impl Inner {
    fn lock_downloads(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<DownloadId, Arc<watch::Sender<DownloadStatus>>>> {
        self.downloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hold the download until the active network is of a permitted class.
    async fn wait_for_network(
        &self,
        id: DownloadId,
        request: &DownloadRequest,
        status: &watch::Sender<DownloadStatus>,
    ) {
        loop {
            let class = (self.probe)();
            if request.permits(class) {
                return;
            }
            if *status.borrow() != DownloadStatus::WaitingForNetwork {
                info!(id = %id, ?class, "network class not permitted, holding download");
                status.send_replace(DownloadStatus::WaitingForNetwork);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn transfer(
        &self,
        id: DownloadId,
        url: &Url,
        request: &DownloadRequest,
        status: &watch::Sender<DownloadStatus>,
    ) -> Result<(PathBuf, u64)> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let response = self.client.get(url.clone()).send().await?;
        let code = response.status();
        if !code.is_success() {
            return Err(QueueError::Status {
                status: code.as_u16(),
                url: url.to_string(),
            });
        }

        let final_path = self.download_dir.join(&request.file_name);
        let part_path = part_path(&self.download_dir, &request.file_name, id);

        status.send_replace(DownloadStatus::Running { bytes: 0 });
        let written = match stream_to_file(response, &part_path, status).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(e);
            }
        };
        // Downloads sharing a file name each own a part file; the last
        // rename wins the final name.
        tokio::fs::rename(&part_path, &final_path).await?;

        debug!(id = %id, path = %final_path.display(), bytes = written, "download stored");
        Ok((final_path, written))
    }
}

/// Temporary file a download streams into before it is renamed into place.
fn part_path(dir: &Path, file_name: &str, id: DownloadId) -> PathBuf {
    dir.join(format!("{}.{}.part", file_name, id))
}

async fn stream_to_file(
    response: reqwest::Response,
    path: &Path,
    status: &watch::Sender<DownloadStatus>,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
        status.send_replace(DownloadStatus::Running { bytes });
    }
    file.flush().await?;
    Ok(bytes)
}

async fn run_download(
    inner: Arc<Inner>,
    id: DownloadId,
    url: Url,
    request: DownloadRequest,
    status: Arc<watch::Sender<DownloadStatus>>,
) {
    inner.wait_for_network(id, &request, &status).await;

    match inner.transfer(id, &url, &request, &status).await {
        Ok((path, bytes)) => {
            info!(id = %id, path = %path.display(), bytes, "download complete");
            status.send_replace(DownloadStatus::Completed { path, bytes });
        }
        Err(e) => {
            warn!(id = %id, url = %url, error = %e, "download failed");
            status.send_replace(DownloadStatus::Failed {
                reason: e.to_string(),
            });
        }
    }
}
