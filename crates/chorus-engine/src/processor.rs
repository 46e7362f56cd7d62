//! Drives one request from channel open to a terminal state.
//!
//! A processor task is spawned per request. It writes only into the session
//! addressed by the agent id captured at send time, and every write first
//! checks that its request is still the session's active one, so a request
//! that was cancelled or cleared can never touch a later request's state.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use chorus_core::channel::{ChunkRequest, ChunkSource, ChunkStream};
use chorus_core::ids::{AgentId, ConversationId, RequestId};
use chorus_core::messages::Message;
use chorus_core::persistence::PersistedRole;

use crate::artifacts::ArtifactSink;
use crate::config::OrchestratorConfig;
use crate::credential::{CredentialGate, PendingInput};
use crate::fold::{self, Step, StreamState};
use crate::projection::VisibleProjection;
use crate::recorder::ConversationRecorder;
use crate::session::{AgentSession, AgentSessionStore};

/// How a request ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed { content: String },
    Failed { error: String },
    Cancelled,
    CredentialRequired,
    /// The session was cleared or taken over before the request finished.
    Superseded,
}

/// Whether the user turn still needs persisting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SendMode {
    Fresh,
    /// Re-run of an input already in the transcript and already persisted.
    Resume,
}

/// Everything captured at send time.
pub(crate) struct RequestContext {
    pub agent_id: AgentId,
    pub request_id: RequestId,
    pub text: String,
    pub placeholder: Message,
    pub cancel: CancellationToken,
    pub mode: SendMode,
}

/// Shared collaborators of every request task.
#[derive(Clone)]
pub(crate) struct StreamProcessor {
    pub store: Arc<AgentSessionStore>,
    pub projection: Arc<VisibleProjection>,
    pub source: Arc<dyn ChunkSource>,
    pub recorder: ConversationRecorder,
    pub artifacts: Arc<dyn ArtifactSink>,
    pub gate: Arc<CredentialGate>,
    pub config: Arc<OrchestratorConfig>,
}

enum Ending {
    Finished(StreamState, Step),
    Cancelled(StreamState),
}

impl StreamProcessor {
    #[instrument(skip_all, fields(agent_id = %ctx.agent_id, request_id = %ctx.request_id))]
    pub async fn run(self, ctx: RequestContext) -> RequestOutcome {
        // Opening a conversation waits on persistence; cancellation must not.
        let conversation_id = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                let state = StreamState::new(ctx.placeholder.clone());
                return self.finish_cancelled(&ctx, state);
            }
            id = self.ensure_conversation(&ctx) => id,
        };

        let user_persist = match (&conversation_id, ctx.mode) {
            (Some(conv), SendMode::Fresh) => Some(self.recorder.spawn_record(
                conv.clone(),
                PersistedRole::User,
                ctx.text.clone(),
            )),
            _ => None,
        };

        let state = StreamState::new(ctx.placeholder.clone());
        let ending = self.consume(&ctx, conversation_id.clone(), state).await;

        match ending {
            Ending::Cancelled(state) => self.finish_cancelled(&ctx, state),
            Ending::Finished(state, Step::CredentialRequired) => self.finish_credentials(&ctx, state),
            Ending::Finished(state, step) => {
                self.finish(&ctx, state, step, conversation_id, user_persist)
                    .await
            }
        }
    }

    /// Reuse the session's conversation or open one titled after this input.
    /// `None` when persistence is unavailable or the request was superseded
    /// while the conversation was being created.
    async fn ensure_conversation(&self, ctx: &RequestContext) -> Option<ConversationId> {
        if let Some(existing) = self.store.get(&ctx.agent_id).conversation_id {
            return Some(existing);
        }
        let title = self.config.title_for(&ctx.text);
        let id = self.recorder.open(&ctx.agent_id, &title).await?;
        // Cache only while this request still owns the session.
        let cached = self.write(ctx, |s| {
            if s.conversation_id.is_none() {
                s.conversation_id = Some(id.clone());
            }
            s.conversation_id.clone()
        });
        if cached.is_none() {
            debug!(conversation_id = %id, "request superseded while opening conversation");
        }
        cached.flatten()
    }

    async fn open(&self, ctx: &RequestContext, conversation_id: Option<ConversationId>) -> Result<ChunkStream, String> {
        let request = ChunkRequest {
            request_id: ctx.request_id.clone(),
            agent_id: ctx.agent_id.clone(),
            message: ctx.text.clone(),
            conversation_id,
        };
        self.source.open(request).await.map_err(|e| {
            warn!(error = %e, kind = e.error_kind(), source = self.source.name(), "failed to open chunk channel");
            e.to_string()
        })
    }

    async fn consume(
        &self,
        ctx: &RequestContext,
        conversation_id: Option<ConversationId>,
        mut state: StreamState,
    ) -> Ending {
        let opened = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Ending::Cancelled(state),
            opened = self.open(ctx, conversation_id) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(detail) => {
                let state = fold::fail(state, &self.config, detail);
                return Ending::Finished(state, Step::Failed);
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Ending::Cancelled(state),
                next = stream.next() => next,
            };

            let chunk = match next {
                None => {
                    debug!(chunks = state.chunks_seen, "channel exhausted");
                    let state = fold::complete(state, &self.config);
                    return Ending::Finished(state, Step::Done);
                }
                Some(Err(e)) if e.is_skippable() => {
                    debug!(error = %e, "skipping malformed chunk");
                    continue;
                }
                Some(Err(e)) => {
                    warn!(error = %e, kind = e.error_kind(), "chunk channel failed");
                    let state = fold::fail(state, &self.config, e.to_string());
                    return Ending::Finished(state, Step::Failed);
                }
                Some(Ok(chunk)) => chunk,
            };

            trace!(kind = chunk.kind(), "chunk received");
            let (next_state, step) = fold::step(state, chunk, &self.config);
            state = next_state;

            match step {
                Step::Continue => {
                    let message = state.message.clone();
                    if self.write(ctx, |s| s.streaming = Some(message)).is_none() {
                        return Ending::Cancelled(state);
                    }
                }
                Step::Status(status) => {
                    let message = state.message.clone();
                    let written = self.write(ctx, |s| {
                        s.messages.push(status);
                        s.streaming = Some(message);
                    });
                    if written.is_none() {
                        return Ending::Cancelled(state);
                    }
                }
                Step::Artifact(artifact) => self.artifacts.emit(&ctx.agent_id, artifact),
                terminal => return Ending::Finished(state, terminal),
            }
        }
    }

    async fn finish(
        &self,
        ctx: &RequestContext,
        state: StreamState,
        step: Step,
        conversation_id: Option<ConversationId>,
        user_persist: Option<JoinHandle<bool>>,
    ) -> RequestOutcome {
        let message = state.message.clone();
        let written = self.write(ctx, |s| {
            fold::prune_in_progress(&mut s.messages, &state.status_ids);
            s.messages.push(message);
            s.finish_request();
        });
        if written.is_none() {
            debug!("request superseded before it could finalize");
            return RequestOutcome::Superseded;
        }

        if step == Step::Failed {
            let error = state.message.error.clone().unwrap_or_default();
            info!(error = %error, "request failed");
            return RequestOutcome::Failed { error };
        }

        // Markers are UI text, not answers: only real content is persisted.
        if !state.accumulated.is_empty() {
            if let Some(conv) = &conversation_id {
                if let Some(handle) = user_persist {
                    if let Err(e) = handle.await {
                        warn!(error = %e, "user message persistence task failed");
                    }
                }
                let _ = self
                    .recorder
                    .record(conv, PersistedRole::Assistant, &state.accumulated)
                    .await;
            }
        }

        info!(chunks = state.chunks_seen, "request completed");
        RequestOutcome::Completed {
            content: state.message.content,
        }
    }

    fn finish_cancelled(&self, ctx: &RequestContext, state: StreamState) -> RequestOutcome {
        let written = self.write(ctx, |s| {
            fold::prune_all(&mut s.messages, &state.status_ids);
            s.finish_request();
        });
        debug!(superseded = written.is_none(), "request cancelled");
        RequestOutcome::Cancelled
    }

    fn finish_credentials(&self, ctx: &RequestContext, state: StreamState) -> RequestOutcome {
        let written = self.write(ctx, |s| {
            fold::prune_in_progress(&mut s.messages, &state.status_ids);
            s.finish_request();
        });
        if written.is_none() {
            return RequestOutcome::Superseded;
        }
        let _ = self.gate.hold(PendingInput {
            agent_id: ctx.agent_id.clone(),
            text: ctx.text.clone(),
        });
        RequestOutcome::CredentialRequired
    }

    /// Mutate the request's own session if the request is still active, then
    /// refresh the visible projection. `None` means the request was
    /// superseded and nothing was written.
    fn write<R>(&self, ctx: &RequestContext, f: impl FnOnce(&mut AgentSession) -> R) -> Option<R> {
        let (result, _) = self.store.mutate(&ctx.agent_id, |s| {
            if !s.is_active(&ctx.request_id) {
                return None;
            }
            Some(f(s))
        });
        if result.is_some() {
            self.projection.refresh(&ctx.agent_id);
        }
        result
    }
}
