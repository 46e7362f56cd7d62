use chorus_core::errors::PersistenceError;
use chorus_core::ids::AgentId;

/// Why a `send` or `resume_after_credentials` did nothing.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendRejected {
    #[error("agent {0} already has a request in flight")]
    Busy(AgentId),

    #[error("message is empty")]
    EmptyInput,

    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("no input is waiting for credentials on agent {0}")]
    NothingPending(AgentId),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] SendRejected),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
