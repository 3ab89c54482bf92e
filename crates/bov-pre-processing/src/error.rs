//! Error types for bag-of-vectors builds.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Every failure is fatal to the run that raised it.
#[derive(Debug, Error)]
pub enum BovError {
    /// Invalid user input, detected before any work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// An embedding table or document that cannot be read or parsed.
    #[error("format error in {resource}: {detail}")]
    Format { resource: String, detail: String },

    /// Filesystem failure while discovering, writing or pruning.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BovError {
    pub(crate) fn format(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Format {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BovError>;
