use std::time::Duration;

/// Failures reported by a chunk channel.
///
/// `Malformed` is per-chunk and never ends a stream; every other variant is a
/// channel failure that terminates the request in the Error state.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed chunk: {0}")]
    Malformed(String),
    #[error("stream interrupted: {0}")]
    Interrupted(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl ChannelError {
    /// A skippable error affects one chunk only; the stream keeps going.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Http { .. } => "http_error",
            Self::Malformed(_) => "malformed",
            Self::Interrupted(_) => "stream_interrupted",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        Self::Http { status, body }
    }
}

/// Failures reported by a persistence bridge.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("invalid record: {0}")]
    Invalid(String),
}
