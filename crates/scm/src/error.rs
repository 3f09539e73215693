//! Error types for git hosting lookups.

use thiserror::Error;

/// Errors that can occur while resolving or querying a repository.
#[derive(Debug, Error)]
pub enum ScmError {
    /// The string is not shaped like a repository URL
    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    /// The URL points at a host we have no client for
    #[error("unsupported git host: {0}")]
    UnsupportedHost(String),

    /// The hosting API answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Http { status: u16, url: String },

    /// The request never produced a response
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ScmError {
    /// HTTP status code of the failed call, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ScmError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
