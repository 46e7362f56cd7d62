//! Pure chunk fold: `(StreamState, StreamChunk) -> (StreamState, Step)`.
//!
//! Nothing here touches a store, a channel or a clock. The processor owns the
//! side effects each [`Step`] asks for.

use tracing::debug;

use chorus_core::artifact::Artifact;
use chorus_core::chunk::StreamChunk;
use chorus_core::ids::MessageId;
use chorus_core::messages::{Message, ToolCall, ToolStatus};

use crate::config::OrchestratorConfig;

/// Accumulated state of the in-flight assistant message.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamState {
    pub message: Message,
    /// Concatenated `text` chunks.
    pub accumulated: String,
    /// Every chunk that reached the fold, terminal and unknown ones included.
    pub chunks_seen: usize,
    /// Status messages emitted by this request, in order.
    pub status_ids: Vec<MessageId>,
    /// `message.content` currently mirrors `accumulated`.
    shows_text: bool,
}

impl StreamState {
    pub fn new(placeholder: Message) -> Self {
        Self {
            message: placeholder,
            accumulated: String::new(),
            chunks_seen: 0,
            status_ids: Vec::new(),
            shows_text: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        !self.message.is_streaming
    }
}

/// What the processor must do after folding one chunk.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Publish the updated in-flight message and keep reading.
    Continue,
    /// Append this standalone status message, then keep reading.
    Status(Message),
    /// Hand the artifact to the sink; the message is unchanged.
    Artifact(Artifact),
    /// Stop reading; the request waits for credentials.
    CredentialRequired,
    /// The message finalized normally.
    Done,
    /// The message finalized in the error state.
    Failed,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CredentialRequired | Self::Done | Self::Failed)
    }
}

pub fn step(
    mut state: StreamState,
    chunk: StreamChunk,
    config: &OrchestratorConfig,
) -> (StreamState, Step) {
    state.chunks_seen += 1;

    let step = match chunk {
        StreamChunk::Thinking { content } => {
            state.message.content = content;
            state.shows_text = false;
            Step::Continue
        }
        StreamChunk::Text { content } => {
            state.accumulated.push_str(&content);
            if state.shows_text {
                state.message.content.push_str(&content);
            } else {
                state.message.content.clone_from(&state.accumulated);
                state.shows_text = true;
            }
            Step::Continue
        }
        StreamChunk::ToolCall { name, input } => {
            state.message.tool_calls.push(ToolCall::pending(name, input));
            Step::Continue
        }
        StreamChunk::ToolResult { name, output } => {
            resolve_tool(&mut state.message, &name, output);
            Step::Continue
        }
        StreamChunk::Sources { sources } => {
            state.message.sources = sources;
            Step::Continue
        }
        StreamChunk::Artifact(artifact) => Step::Artifact(artifact),
        StreamChunk::Status { content } if content == config.credential_sentinel => {
            Step::CredentialRequired
        }
        StreamChunk::Status { content } => {
            let kind = config.classify_status(&content);
            let status = Message::status(content, kind);
            state.status_ids.push(status.id.clone());
            Step::Status(status)
        }
        StreamChunk::Error { message } => {
            state.shows_text = false;
            state.message.content = message.clone();
            state.message.error = Some(message);
            state.message.is_streaming = false;
            Step::Failed
        }
        StreamChunk::Done => {
            state = complete(state, config);
            Step::Done
        }
        StreamChunk::Unknown { chunk_type } => {
            debug!(chunk_type = %chunk_type, "ignoring unknown chunk type");
            Step::Continue
        }
    };

    (state, step)
}

/// Finalize on a `done` chunk or when the channel ends without one.
pub fn complete(mut state: StreamState, config: &OrchestratorConfig) -> StreamState {
    state.message.content = if !state.accumulated.is_empty() {
        state.accumulated.clone()
    } else if state.chunks_seen == 0 {
        config.no_response_marker.clone()
    } else {
        config.no_content_marker.clone()
    };
    state.message.is_streaming = false;
    state
}

/// Finalize after the channel itself failed.
pub fn fail(mut state: StreamState, config: &OrchestratorConfig, detail: String) -> StreamState {
    state.message.content = config.generic_error.clone();
    state.message.error = Some(detail);
    state.message.is_streaming = false;
    state
}

/// Remove the in-progress status lines this request produced.
pub fn prune_in_progress(messages: &mut Vec<Message>, status_ids: &[MessageId]) {
    messages.retain(|m| !(m.is_in_progress_status() && status_ids.contains(&m.id)));
}

/// Remove every status line this request produced.
pub fn prune_all(messages: &mut Vec<Message>, status_ids: &[MessageId]) {
    messages.retain(|m| !status_ids.contains(&m.id));
}

fn resolve_tool(message: &mut Message, name: &str, output: String) {
    let Some(idx) = message.oldest_pending_tool(name) else {
        debug!(tool = name, "tool_result without a pending call");
        return;
    };
    let call = &mut message.tool_calls[idx];
    call.status = if output.to_lowercase().contains("error") {
        ToolStatus::Error
    } else {
        ToolStatus::Success
    };
    call.output = Some(output);
}
