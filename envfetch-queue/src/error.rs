/// Errors produced by the download queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid download request: {0}")]
    InvalidRequest(String),

    #[error("no tokio runtime available to drive downloads")]
    NoRuntime,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, QueueError>;
