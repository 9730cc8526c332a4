//! Error types for envfetch

use thiserror::Error;

use crate::artifact::ArtifactId;

/// Result type alias using envfetch Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in envfetch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Textual artifact id that cannot be split into namespace and leaf
    #[error("Invalid artifact id: {0}")]
    InvalidArtifactId(String),

    /// Catalog composition would introduce an id twice
    #[error("Duplicate artifact in catalog: {0}")]
    DuplicateArtifact(ArtifactId),

    /// An existence or connectivity oracle could not answer
    #[error("{oracle} oracle unavailable: {reason}")]
    OracleUnavailable {
        oracle: &'static str,
        reason: String,
    },

    /// The choice prompt dropped its responder without choosing
    #[error("Choice prompt closed without a selection")]
    PromptNotResolved,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn oracle(oracle: &'static str, reason: impl Into<String>) -> Self {
        Error::OracleUnavailable {
            oracle,
            reason: reason.into(),
        }
    }
}
