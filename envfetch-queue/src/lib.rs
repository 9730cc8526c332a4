//! envfetch-queue: an in-process stand-in for a platform download service.
//!
//! Requests are accepted immediately and transferred on background tokio
//! tasks. Each request carries a network policy; a request that forbids
//! metered networks is held in [`DownloadStatus::WaitingForNetwork`] until
//! the configured probe reports an unmetered network.
//!
//! ```no_run
//! use envfetch_queue::{DownloadQueue, DownloadRequest};
//!
//! # async fn demo() -> envfetch_queue::Result<()> {
//! let queue = DownloadQueue::builder("/tmp/downloads").build()?;
//! let id = queue.enqueue(
//!     DownloadRequest::new("https://example.com/rootfs.tar.gz", "rootfs.tar.gz")
//!         .allow_metered(false),
//! )?;
//! let status = queue.wait(id).await;
//! println!("{:?}", status);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod queue;
pub mod request;

pub use error::{QueueError, Result};
pub use queue::{DownloadId, DownloadQueue, DownloadQueueBuilder, DownloadStatus, NetworkProbe};
pub use request::{DownloadRequest, NetworkClass};
