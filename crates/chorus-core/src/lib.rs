//! Data model shared by every chorus crate: ids, messages, chunk events,
//! artifacts, and the two collaborator traits the orchestration core talks
//! to (`ChunkSource` and `PersistenceBridge`).

pub mod artifact;
pub mod channel;
pub mod chunk;
pub mod errors;
pub mod ids;
pub mod messages;
pub mod persistence;
