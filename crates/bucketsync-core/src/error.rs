use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Server operations, used to label failures and to decide which ones
/// treat a 404 as "feature unavailable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    FetchAll,
    Add,
    Move,
    Update,
    Split,
    Done,
    Delete,
}

impl Endpoint {
    pub fn label(self) -> &'static str {
        match self {
            Endpoint::FetchAll => "Fetch",
            Endpoint::Add => "Add",
            Endpoint::Move => "Move",
            Endpoint::Update => "Update",
            Endpoint::Split => "Split",
            Endpoint::Done => "Done",
            Endpoint::Delete => "Delete",
        }
    }

    /// Optional server features report absence with a plain 404.
    pub fn is_optional(self) -> bool {
        matches!(self, Endpoint::Update | Endpoint::Split)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("{endpoint} endpoint not available on server")]
    Unavailable { endpoint: Endpoint },

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    #[error(
        "server rejected {path} with HTTP {status}: {}",
        .reason.as_deref().unwrap_or("no reason given")
    )]
    Status {
        path: String,
        status: u16,
        reason: Option<String>,
    },

    #[error("malformed response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl SyncError {
    pub fn transport(
        path: impl Into<String>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            path: path.into(),
            source: Arc::new(err),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SyncError::Unavailable { .. })
    }
}

/// Rejected input caught before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("both date and time are required")]
    MissingDateOrTime,

    #[error("invalid due date '{0}' (expected YYYY-MM-DD)")]
    BadDate(String),

    #[error("invalid due time '{0}' (expected HH:MM)")]
    BadTime(String),
}
