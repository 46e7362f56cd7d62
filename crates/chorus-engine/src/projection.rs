use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use chorus_core::ids::AgentId;

use crate::session::{AgentSessionStore, SessionSnapshot};

/// What the UI shows: the selected agent and a copy of its session.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleState {
    pub agent_id: AgentId,
    pub session: SessionSnapshot,
}

/// Mirrors exactly one agent's session to UI observers.
///
/// Switching and publishing both run under `current`, and both read the
/// session from the store while holding it, so a background request can
/// never publish over a newer selection. Lock order is always
/// projection then store slot.
pub struct VisibleProjection {
    store: Arc<AgentSessionStore>,
    current: Mutex<AgentId>,
    tx: watch::Sender<VisibleState>,
}

impl VisibleProjection {
    pub fn new(store: Arc<AgentSessionStore>, initial: AgentId) -> Self {
        let session = store.get(&initial);
        let (tx, _) = watch::channel(VisibleState {
            agent_id: initial.clone(),
            session,
        });
        Self {
            store,
            current: Mutex::new(initial),
            tx,
        }
    }

    pub fn visible_agent(&self) -> AgentId {
        self.current.lock().clone()
    }

    pub fn current(&self) -> VisibleState {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<VisibleState> {
        self.tx.subscribe()
    }

    /// Select `agent_id` and publish its session as it is right now.
    /// Returns false if it was already selected.
    pub fn switch_to(&self, agent_id: &AgentId) -> bool {
        let mut current = self.current.lock();
        let changed = *current != *agent_id;
        *current = agent_id.clone();
        self.publish_locked(&current);
        changed
    }

    /// Republish `agent_id` if it is the selected agent. Called after every
    /// mutation of any session; a no-op for background agents.
    pub fn refresh(&self, agent_id: &AgentId) -> bool {
        let current = self.current.lock();
        if *current != *agent_id {
            return false;
        }
        self.publish_locked(&current);
        true
    }

    fn publish_locked(&self, agent_id: &AgentId) {
        let state = VisibleState {
            agent_id: agent_id.clone(),
            session: self.store.get(agent_id),
        };
        self.tx.send_if_modified(|visible| {
            if *visible == state {
                false
            } else {
                *visible = state;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::messages::Message;

    fn setup() -> (Arc<AgentSessionStore>, VisibleProjection) {
        let store = Arc::new(AgentSessionStore::new());
        let projection = VisibleProjection::new(Arc::clone(&store), AgentId::new("general"));
        (store, projection)
    }

    #[test]
    fn starts_on_initial_agent() {
        let (_, projection) = setup();
        assert_eq!(projection.visible_agent().as_str(), "general");
        assert!(projection.current().session.messages.is_empty());
    }

    #[test]
    fn background_refresh_is_ignored() {
        let (store, projection) = setup();
        let research = AgentId::new("research");
        let _ = store.mutate(&research, |s| s.messages.push(Message::user("bg")));

        assert!(!projection.refresh(&research));
        assert_eq!(projection.current().agent_id.as_str(), "general");
        assert!(projection.current().session.messages.is_empty());
    }

    #[test]
    fn switch_publishes_target_session_unchanged() {
        let (store, projection) = setup();
        let research = AgentId::new("research");
        let (_, snapshot) = store.mutate(&research, |s| {
            s.messages.push(Message::user("q"));
            s.is_loading = true;
        });

        assert!(projection.switch_to(&research));
        let visible = projection.current();
        assert_eq!(visible.agent_id, research);
        assert_eq!(visible.session, snapshot);
        assert_eq!(store.get(&research), snapshot);
    }

    #[test]
    fn switching_to_same_agent_reports_no_change() {
        let (_, projection) = setup();
        assert!(!projection.switch_to(&AgentId::new("general")));
    }

    #[tokio::test]
    async fn watchers_see_visible_refreshes() {
        let (store, projection) = setup();
        let mut rx = projection.watch();
        let general = AgentId::new("general");

        let _ = store.mutate(&general, |s| s.messages.push(Message::user("hi")));
        assert!(projection.refresh(&general));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().session.messages.len(), 1);
    }
}
