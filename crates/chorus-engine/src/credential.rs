use parking_lot::Mutex;
use tracing::{info, warn};

use chorus_core::ids::AgentId;

/// Input held back while the user supplies credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingInput {
    pub agent_id: AgentId,
    pub text: String,
}

/// Single process-wide slot for a request interrupted by a credential
/// challenge. A second interrupt replaces the first.
#[derive(Default)]
pub struct CredentialGate {
    slot: Mutex<Option<PendingInput>>,
}

impl CredentialGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `input`; returns whatever it displaced.
    pub fn hold(&self, input: PendingInput) -> Option<PendingInput> {
        info!(agent_id = %input.agent_id, "request waiting for credentials");
        let previous = self.slot.lock().replace(input);
        if let Some(prev) = &previous {
            warn!(
                agent_id = %prev.agent_id,
                "pending credential input overwritten by a newer interrupt"
            );
        }
        previous
    }

    pub fn pending(&self) -> Option<PendingInput> {
        self.slot.lock().clone()
    }

    /// Take the held input if it belongs to `agent_id`. Leaves another
    /// agent's input in place.
    pub fn take_for(&self, agent_id: &AgentId) -> Option<PendingInput> {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|p| &p.agent_id == agent_id) {
            slot.take()
        } else {
            None
        }
    }
}
