//! Session orchestrator: the public entry point of the engine.
//!
//! Commands arrive here, get validated against the target session, and are
//! handed to a [`StreamProcessor`] task that owns the request until it ends.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use chorus_core::channel::ChunkSource;
use chorus_core::ids::{AgentId, ConversationId, MessageId, RequestId};
use chorus_core::messages::{Message, StatusKind};
use chorus_core::persistence::{ConversationSummary, PersistedRole, PersistenceBridge, StoredMessage};

use crate::artifacts::{ArtifactSink, DiscardArtifacts};
use crate::config::OrchestratorConfig;
use crate::credential::{CredentialGate, PendingInput};
use crate::error::{EngineError, SendRejected};
use crate::processor::{RequestContext, RequestOutcome, SendMode, StreamProcessor};
use crate::projection::{VisibleProjection, VisibleState};
use crate::recorder::ConversationRecorder;
use crate::session::{ActiveRequest, AgentSessionStore, SessionSnapshot};

/// A request accepted by [`SessionOrchestrator::send`].
#[derive(Debug)]
pub struct RequestHandle {
    pub request_id: RequestId,
    pub agent_id: AgentId,
    task: JoinHandle<RequestOutcome>,
}

impl RequestHandle {
    /// Wait for the request to reach a terminal state.
    pub async fn outcome(self) -> RequestOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => RequestOutcome::Failed {
                error: format!("request task failed: {e}"),
            },
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct SessionOrchestrator {
    config: Arc<OrchestratorConfig>,
    store: Arc<AgentSessionStore>,
    projection: Arc<VisibleProjection>,
    gate: Arc<CredentialGate>,
    recorder: ConversationRecorder,
    source: Arc<dyn ChunkSource>,
    artifacts: Arc<dyn ArtifactSink>,
}

impl SessionOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        source: Arc<dyn ChunkSource>,
        bridge: Arc<dyn PersistenceBridge>,
    ) -> Self {
        let store = Arc::new(AgentSessionStore::new());
        let projection = Arc::new(VisibleProjection::new(
            Arc::clone(&store),
            config.default_agent.clone(),
        ));
        Self {
            config: Arc::new(config),
            store,
            projection,
            gate: Arc::new(CredentialGate::new()),
            recorder: ConversationRecorder::new(bridge),
            source,
            artifacts: Arc::new(DiscardArtifacts),
        }
    }

    /// Artifacts are dropped unless a sink is supplied here.
    pub fn with_artifact_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.artifacts = sink;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start a request for `agent_id`. Must be called inside a tokio runtime.
    #[instrument(skip_all, fields(agent_id = %agent_id))]
    pub fn send(&self, agent_id: &AgentId, text: &str) -> Result<RequestHandle, SendRejected> {
        self.check_agent(agent_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejected::EmptyInput);
        }
        self.start(agent_id, text.to_string(), SendMode::Fresh)
    }

    /// Re-run the input held by the credential gate for `agent_id`. The user
    /// message is already in the transcript and in persistence, so only the
    /// channel is reopened.
    #[instrument(skip_all, fields(agent_id = %agent_id))]
    pub fn resume_after_credentials(&self, agent_id: &AgentId) -> Result<RequestHandle, SendRejected> {
        let pending = self
            .gate
            .pending()
            .filter(|p| &p.agent_id == agent_id)
            .ok_or_else(|| SendRejected::NothingPending(agent_id.clone()))?;
        let handle = self.start(agent_id, pending.text, SendMode::Resume)?;
        let _ = self.gate.take_for(agent_id);
        info!(request_id = %handle.request_id, "resumed after credentials");
        Ok(handle)
    }

    pub fn pending_credentials(&self) -> Option<PendingInput> {
        self.gate.pending()
    }

    fn check_agent(&self, agent_id: &AgentId) -> Result<(), SendRejected> {
        if self.config.is_known_agent(agent_id) {
            Ok(())
        } else {
            Err(SendRejected::UnknownAgent(agent_id.clone()))
        }
    }

    fn start(&self, agent_id: &AgentId, text: String, mode: SendMode) -> Result<RequestHandle, SendRejected> {
        let request_id = RequestId::new();
        let cancel = CancellationToken::new();
        let placeholder = Message::assistant_placeholder(&self.config.working_placeholder);

        let (accepted, _) = self.store.mutate(agent_id, |s| {
            if s.is_loading {
                return false;
            }
            if mode == SendMode::Fresh {
                s.messages.push(Message::user(text.clone()));
            }
            s.streaming = Some(placeholder.clone());
            s.is_loading = true;
            s.active = Some(ActiveRequest {
                request_id: request_id.clone(),
                cancel: cancel.clone(),
            });
            true
        });
        if !accepted {
            debug!("send ignored, request already in flight");
            return Err(SendRejected::Busy(agent_id.clone()));
        }
        self.projection.refresh(agent_id);

        let processor = StreamProcessor {
            store: Arc::clone(&self.store),
            projection: Arc::clone(&self.projection),
            source: Arc::clone(&self.source),
            recorder: self.recorder.clone(),
            artifacts: Arc::clone(&self.artifacts),
            gate: Arc::clone(&self.gate),
            config: Arc::clone(&self.config),
        };
        let ctx = RequestContext {
            agent_id: agent_id.clone(),
            request_id: request_id.clone(),
            text,
            placeholder,
            cancel,
            mode,
        };
        let task = tokio::spawn(processor.run(ctx));
        debug!(request_id = %request_id, "request started");

        Ok(RequestHandle {
            request_id,
            agent_id: agent_id.clone(),
            task,
        })
    }

    /// Mirror `agent_id` to observers. Background streams keep running.
    #[instrument(skip_all, fields(agent_id = %agent_id))]
    pub fn switch_visible_agent(&self, agent_id: &AgentId) -> bool {
        self.projection.switch_to(agent_id)
    }

    /// Trigger the active request's cancellation. The processor finalizes the
    /// session; returns false when nothing was in flight.
    #[instrument(skip_all, fields(agent_id = %agent_id))]
    pub fn cancel(&self, agent_id: &AgentId) -> bool {
        let (token, _) = self
            .store
            .mutate(agent_id, |s| s.active.as_ref().map(|a| a.cancel.clone()));
        match token {
            Some(token) => {
                token.cancel();
                debug!("cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Cancel anything in flight and start the agent over with an empty,
    /// unpersisted session.
    #[instrument(skip_all, fields(agent_id = %agent_id))]
    pub fn clear_session(&self, agent_id: &AgentId) {
        let (token, _) = self.store.mutate(agent_id, |s| {
            let token = s.active.as_ref().map(|a| a.cancel.clone());
            s.finish_request();
            s.messages.clear();
            s.conversation_id = None;
            token
        });
        if let Some(token) = token {
            token.cancel();
        }
        let _ = self.gate.take_for(agent_id);
        self.projection.refresh(agent_id);
        info!("session cleared");
    }

    /// Replace an idle session with a persisted conversation.
    #[instrument(skip_all, fields(agent_id = %agent_id, conversation_id = %conversation_id))]
    pub async fn load_conversation(
        &self,
        agent_id: &AgentId,
        conversation_id: &ConversationId,
    ) -> Result<SessionSnapshot, EngineError> {
        self.check_agent(agent_id)?;
        if self.store.get(agent_id).is_loading {
            return Err(SendRejected::Busy(agent_id.clone()).into());
        }

        let conversation = self.recorder.load(conversation_id).await?;
        let messages: Vec<Message> = conversation.messages.into_iter().map(restore).collect();

        // A send may have started while the conversation was loading.
        let (replaced, snapshot) = self.store.mutate(agent_id, |s| {
            if s.is_loading {
                return false;
            }
            s.messages = messages;
            s.streaming = None;
            s.conversation_id = Some(conversation.id.clone());
            true
        });
        if !replaced {
            return Err(SendRejected::Busy(agent_id.clone()).into());
        }
        self.projection.refresh(agent_id);
        info!(messages = snapshot.messages.len(), "conversation loaded");
        Ok(snapshot)
    }

    pub async fn history(&self, agent_id: &AgentId) -> Result<Vec<ConversationSummary>, EngineError> {
        Ok(self.recorder.list(agent_id).await?)
    }

    pub fn visible(&self) -> VisibleState {
        self.projection.current()
    }

    pub fn watch_visible(&self) -> watch::Receiver<VisibleState> {
        self.projection.watch()
    }

    pub fn session(&self, agent_id: &AgentId) -> SessionSnapshot {
        self.store.get(agent_id)
    }

    pub fn subscribe(&self, agent_id: &AgentId) -> watch::Receiver<SessionSnapshot> {
        self.store.subscribe(agent_id)
    }

    pub fn loading_agents(&self) -> Vec<AgentId> {
        self.store.loading_agents()
    }
}

fn restore(stored: StoredMessage) -> Message {
    let mut message = match stored.role {
        PersistedRole::User => Message::user(stored.content),
        PersistedRole::Assistant => Message::assistant(stored.content),
        PersistedRole::System => Message::status(stored.content, StatusKind::Terminal),
    };
    message.id = MessageId::from_raw(stored.id);
    message.created_at = stored.created_at;
    message
}
