use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::chunk::StreamChunk;
use crate::errors::ChannelError;
use crate::ids::{AgentId, ConversationId, RequestId};

/// A lazy, finite sequence of chunks for one logical request.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ChannelError>> + Send>>;

/// Everything a source needs to open a channel for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkRequest {
    pub request_id: RequestId,
    pub agent_id: AgentId,
    pub message: String,
    pub conversation_id: Option<ConversationId>,
}

/// Opens chunk channels. Implemented by the HTTP transport and by test mocks.
///
/// A channel is not restartable: every request opens a new one.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    fn name(&self) -> &str;

    async fn open(&self, request: ChunkRequest) -> Result<ChunkStream, ChannelError>;
}
