use crate::error::{QueueError, Result};
use reqwest::Url;

/// Classification of the active network as seen by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkClass {
    /// Wifi-class network without data cost.
    Unmetered,
    /// Cellular or otherwise metered network.
    Metered,
    /// Metered network while roaming.
    Roaming,
}

/// A single file to download into the queue's download directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Remote location of the bytes.
    pub url: String,
    /// File name inside the download directory.
    pub file_name: String,
    /// Human-readable description, used in logs.
    pub description: String,
    /// Whether the transfer may run on a metered network.
    pub allow_metered: bool,
    /// Whether the transfer may run while roaming.
    pub allow_roaming: bool,
}

impl DownloadRequest {
    /// Create a request that is allowed on every network class.
    pub fn new(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: file_name.into(),
            description: String::new(),
            allow_metered: true,
            allow_roaming: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn allow_metered(mut self, allow: bool) -> Self {
        self.allow_metered = allow;
        self
    }

    pub fn allow_roaming(mut self, allow: bool) -> Self {
        self.allow_roaming = allow;
        self
    }

    /// Whether this request may transfer bytes on a network of `class`.
    ///
    /// Roaming networks are metered too, so they need both permissions.
    pub fn permits(&self, class: NetworkClass) -> bool {
        match class {
            NetworkClass::Unmetered => true,
            NetworkClass::Metered => self.allow_metered,
            NetworkClass::Roaming => self.allow_metered && self.allow_roaming,
        }
    }

    /// Check the request and return its parsed URL.
    pub(crate) fn validate(&self) -> Result<Url> {
        let name = self.file_name.as_str();
        if name.is_empty() || name == "." || name == ".." {
            return Err(QueueError::InvalidRequest(format!(
                "invalid file name '{}'",
                name
            )));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(QueueError::InvalidRequest(format!(
                "file name '{}' must not contain path separators",
                name
            )));
        }

        let url = Url::parse(&self.url)
            .map_err(|e| QueueError::InvalidRequest(format!("invalid URL '{}': {}", self.url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(QueueError::InvalidRequest(format!(
                "unsupported URL scheme '{}'",
                other
            ))),
        }
    }
}
