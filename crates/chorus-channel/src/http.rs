use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Future, Stream};
use reqwest::Client;
use serde_json::json;
use tracing::instrument;

use chorus_core::channel::{ChunkRequest, ChunkSource, ChunkStream};
use chorus_core::chunk::StreamChunk;
use chorus_core::errors::ChannelError;

use crate::sse::SseDecoder;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Connection settings for [`HttpChunkSource`].
#[derive(Clone, Debug)]
pub struct HttpSourceConfig {
    /// Streaming chat endpoint, e.g. `http://localhost:8000/api/chat/stream`.
    pub endpoint: String,
    pub connect_timeout: Duration,
    /// Maximum silence between two body reads before the channel fails.
    pub idle_timeout: Duration,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer_token: Option<String>,
}

impl HttpSourceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            bearer_token: None,
        }
    }
}

/// Opens chunk channels by POSTing to an agent endpoint that answers with a
/// server-sent event stream of JSON chunks.
pub struct HttpChunkSource {
    client: Client,
    config: HttpSourceConfig,
}

impl HttpChunkSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChannelError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

/// Request body understood by the agent endpoint.
fn request_body(request: &ChunkRequest) -> serde_json::Value {
    json!({
        "message": request.message,
        "agent_type": request.agent_id.as_str(),
        "conversation_id": request.conversation_id.as_ref().map(|c| c.as_str()),
        "request_id": request.request_id.as_str(),
    })
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(agent_id = %request.agent_id, request_id = %request.request_id))]
    async fn open(&self, request: ChunkRequest) -> Result<ChunkStream, ChannelError> {
        let mut req = self
            .client
            .post(&self.config.endpoint)
            .header("Accept", "text/event-stream")
            .json(&request_body(&request));

        if let Some(token) = &self.config.bearer_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::from_status(status, body));
        }

        let stream = SseChunkStream::with_idle_timeout(resp.bytes_stream(), self.config.idle_timeout);
        Ok(Box::pin(stream))
    }
}

/// Wraps a byte stream and yields decoded chunks.
/// If no data arrives within `idle_duration`, yields a timeout error and ends.
struct SseChunkStream {
    inner: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    decoder: SseDecoder,
    pending: std::collections::VecDeque<Result<StreamChunk, ChannelError>>,
    idle_deadline: Pin<Box<tokio::time::Sleep>>,
    idle_duration: Duration,
    finished: bool,
}

impl SseChunkStream {
    fn with_idle_timeout(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            decoder: SseDecoder::new(),
            pending: std::collections::VecDeque::new(),
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_duration: idle_timeout,
            finished: false,
        }
    }
}

impl Stream for SseChunkStream {
    type Item = Result<StreamChunk, ChannelError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(item) = self.pending.pop_front() {
            return Poll::Ready(Some(item));
        }
        if self.finished {
            return Poll::Ready(None);
        }

        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let new_deadline = tokio::time::Instant::now() + self.idle_duration;
                    self.idle_deadline.as_mut().reset(new_deadline);

                    let decoded = self.decoder.push(&bytes);
                    self.pending.extend(decoded);

                    if let Some(item) = self.pending.pop_front() {
                        return Poll::Ready(Some(item));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(ChannelError::Interrupted(e.to_string()))));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    let rest = self.decoder.finish();
                    self.pending.extend(rest);
                    return Poll::Ready(self.pending.pop_front());
                }
                Poll::Pending => {
                    if self.idle_deadline.as_mut().poll(cx).is_ready() {
                        self.finished = true;
                        return Poll::Ready(Some(Err(ChannelError::Timeout(self.idle_duration))));
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}
