//! Per-agent conversation state.
//!
//! Every agent owns an independent slice. Slices are created lazily on first
//! access and live until the process ends; a slice is never shared between
//! agents, so a mutation of one agent can never be observed on another.

use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use chorus_core::ids::{AgentId, ConversationId, RequestId};
use chorus_core::messages::Message;

/// The request currently streaming into a session.
#[derive(Clone, Debug)]
pub struct ActiveRequest {
    pub request_id: RequestId,
    pub cancel: CancellationToken,
}

/// Mutable state of one agent's conversation.
#[derive(Debug)]
pub struct AgentSession {
    pub agent_id: AgentId,
    /// Finalized messages in display order.
    pub messages: Vec<Message>,
    /// The assistant message being streamed, if any.
    pub streaming: Option<Message>,
    pub is_loading: bool,
    /// Set once persistence created (or loaded) a conversation.
    pub conversation_id: Option<ConversationId>,
    pub active: Option<ActiveRequest>,
}

impl AgentSession {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            messages: Vec::new(),
            streaming: None,
            is_loading: false,
            conversation_id: None,
            active: None,
        }
    }

    /// True when `request_id` is the request this session is waiting on.
    pub fn is_active(&self, request_id: &RequestId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| &a.request_id == request_id)
    }

    /// Drop the in-flight request state. The caller decides what happens to
    /// the streaming message.
    pub fn finish_request(&mut self) {
        self.streaming = None;
        self.is_loading = false;
        self.active = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            agent_id: self.agent_id.clone(),
            messages: self.messages.clone(),
            streaming: self.streaming.clone(),
            is_loading: self.is_loading,
            conversation_id: self.conversation_id.clone(),
            active_request: self.active.as_ref().map(|a| a.request_id.clone()),
        }
    }
}

/// Read-only copy of a session handed to observers.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub agent_id: AgentId,
    pub messages: Vec<Message>,
    pub streaming: Option<Message>,
    pub is_loading: bool,
    pub conversation_id: Option<ConversationId>,
    pub active_request: Option<RequestId>,
}

impl SessionSnapshot {
    pub fn empty(agent_id: AgentId) -> Self {
        AgentSession::new(agent_id).snapshot()
    }

    /// Finalized messages followed by the in-flight one, as a UI renders them.
    pub fn transcript(&self) -> Vec<&Message> {
        self.messages.iter().chain(self.streaming.as_ref()).collect()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.streaming.as_ref().or_else(|| self.messages.last())
    }
}

struct Slot {
    session: AgentSession,
    notify: watch::Sender<SessionSnapshot>,
}

impl Slot {
    fn new(agent_id: &AgentId) -> Self {
        let session = AgentSession::new(agent_id.clone());
        let (notify, _) = watch::channel(session.snapshot());
        Self { session, notify }
    }
}

/// Keyed registry of agent sessions.
///
/// Each slot sits behind its own `DashMap` shard lock, so a mutation is
/// atomic with respect to its slice and never blocks on another agent's.
#[derive(Default)]
pub struct AgentSessionStore {
    slots: DashMap<AgentId, Slot>,
}

impl AgentSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; creates an empty session on first access.
    pub fn get(&self, agent_id: &AgentId) -> SessionSnapshot {
        self.slots
            .entry(agent_id.clone())
            .or_insert_with(|| Slot::new(agent_id))
            .session
            .snapshot()
    }

    /// Apply `f` to the agent's session and notify that agent's observers if
    /// the visible state changed.
    pub fn mutate<R>(
        &self,
        agent_id: &AgentId,
        f: impl FnOnce(&mut AgentSession) -> R,
    ) -> (R, SessionSnapshot) {
        let mut slot = self
            .slots
            .entry(agent_id.clone())
            .or_insert_with(|| Slot::new(agent_id));
        let result = f(&mut slot.session);
        let snapshot = slot.session.snapshot();
        slot.notify.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
        (result, snapshot)
    }

    /// Observe one agent's session. Only mutations of that agent wake the
    /// receiver.
    pub fn subscribe(&self, agent_id: &AgentId) -> watch::Receiver<SessionSnapshot> {
        self.slots
            .entry(agent_id.clone())
            .or_insert_with(|| Slot::new(agent_id))
            .notify
            .subscribe()
    }

    /// Agents that currently have a session, sorted.
    pub fn agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.slots.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Agents with a request in flight.
    pub fn loading_agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .slots
            .iter()
            .filter(|e| e.value().session.is_loading)
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> AgentId {
        AgentId::new(name)
    }

    #[test]
    fn get_creates_empty_session_lazily() {
        let store = AgentSessionStore::new();
        assert!(store.agents().is_empty());

        let snap = store.get(&agent("research"));
        assert!(snap.messages.is_empty());
        assert!(!snap.is_loading);
        assert!(snap.conversation_id.is_none());
        assert_eq!(store.agents(), vec![agent("research")]);
    }

    #[test]
    fn unknown_agents_never_error() {
        let store = AgentSessionStore::new();
        let (_, snap) = store.mutate(&agent("not-on-any-roster"), |s| {
            s.messages.push(Message::user("hi"))
        });
        assert_eq!(snap.messages.len(), 1);
    }

    #[test]
    fn sessions_are_isolated() {
        let store = AgentSessionStore::new();
        let _ = store.mutate(&agent("a"), |s| {
            s.messages.push(Message::user("for a"));
            s.is_loading = true;
        });
        let b = store.get(&agent("b"));
        assert!(b.messages.is_empty());
        assert!(!b.is_loading);
        assert_eq!(store.loading_agents(), vec![agent("a")]);
    }

    #[test]
    fn mutate_returns_closure_result_and_new_snapshot() {
        let store = AgentSessionStore::new();
        let (len, snap) = store.mutate(&agent("a"), |s| {
            s.messages.push(Message::user("one"));
            s.messages.len()
        });
        assert_eq!(len, 1);
        assert_eq!(snap.messages[0].content, "one");
    }

    #[tokio::test]
    async fn subscribers_only_see_their_agent() {
        let store = AgentSessionStore::new();
        let mut rx_a = store.subscribe(&agent("a"));
        let mut rx_b = store.subscribe(&agent("b"));

        let _ = store.mutate(&agent("a"), |s| s.messages.push(Message::user("x")));

        assert!(rx_a.has_changed().unwrap());
        assert!(!rx_b.has_changed().unwrap());
        assert_eq!(rx_a.borrow_and_update().messages.len(), 1);
        assert!(rx_b.borrow_and_update().messages.is_empty());
    }

    #[tokio::test]
    async fn no_op_mutation_does_not_notify() {
        let store = AgentSessionStore::new();
        let mut rx = store.subscribe(&agent("a"));
        let _ = store.mutate(&agent("a"), |s| s.is_loading);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn is_active_matches_request_id() {
        let mut session = AgentSession::new(agent("a"));
        let id = RequestId::new();
        assert!(!session.is_active(&id));
        session.active = Some(ActiveRequest {
            request_id: id.clone(),
            cancel: CancellationToken::new(),
        });
        assert!(session.is_active(&id));
        assert!(!session.is_active(&RequestId::new()));
        session.finish_request();
        assert!(!session.is_active(&id));
    }

    #[test]
    fn transcript_appends_streaming_message() {
        let mut session = AgentSession::new(agent("a"));
        session.messages.push(Message::user("q"));
        session.streaming = Some(Message::assistant_placeholder("Working..."));
        let snap = session.snapshot();
        let transcript = snap.transcript();
        assert_eq!(transcript.len(), 2);
        assert!(transcript[1].is_streaming);
        assert_eq!(snap.last_message().unwrap().content, "Working...");
    }
}
