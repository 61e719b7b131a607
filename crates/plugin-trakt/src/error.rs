use std::path::PathBuf;

use thiserror::Error;

/// Errors from the nickname store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("opening user store at {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("creating store directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("user store query failed")]
    Query(#[source] rusqlite::Error),

    #[error("user store task failed")]
    Task(#[source] tokio::task::JoinError),
}

/// Errors from the Trakt API client.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response body from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("trakt client setup: {0}")]
    Setup(String),
}

/// Anything that stops the trakt command from producing a reply.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl HandlerError {
    /// Short label used as the `kind` field when the failure is logged.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::Resolve(ResolveError::Network { .. }) => "network",
            Self::Resolve(ResolveError::Decode { .. }) => "decode",
            Self::Resolve(ResolveError::Setup(_)) => "setup",
        }
    }
}
