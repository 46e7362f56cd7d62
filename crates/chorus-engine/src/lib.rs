//! Orchestration core: per-agent sessions, the chunk fold, and the
//! orchestrator that ties them to a chunk channel and a persistence bridge.

pub mod artifacts;
pub mod config;
pub mod credential;
pub mod error;
pub mod fold;
pub mod orchestrator;
pub mod processor;
pub mod projection;
pub mod recorder;
pub mod session;

pub use artifacts::{
    ArtifactCollector, ArtifactSink, ChannelArtifactSink, DiscardArtifacts, EmittedArtifact,
};
pub use config::OrchestratorConfig;
pub use credential::{CredentialGate, PendingInput};
pub use error::{EngineError, SendRejected};
pub use orchestrator::{RequestHandle, SessionOrchestrator};
pub use processor::RequestOutcome;
pub use projection::{VisibleProjection, VisibleState};
pub use session::{AgentSessionStore, SessionSnapshot};
