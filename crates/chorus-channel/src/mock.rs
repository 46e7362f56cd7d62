use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use chorus_core::channel::{ChunkRequest, ChunkSource, ChunkStream};
use chorus_core::chunk::StreamChunk;
use chorus_core::errors::ChannelError;

/// Pre-programmed channel behavior for deterministic testing without a server.
pub enum MockResponse {
    /// Yield these items in order, then end.
    Chunks(Vec<Result<StreamChunk, ChannelError>>),
    /// Fail the `open()` call itself.
    Error(ChannelError),
    /// Wait a duration, then resolve the inner response.
    Delay(Duration, Box<MockResponse>),
    /// Yield whatever the paired [`FeedHandle`] sends; ends when it is dropped.
    Feed(mpsc::UnboundedReceiver<Result<StreamChunk, ChannelError>>),
}

impl MockResponse {
    /// A plain text reply followed by `done`.
    pub fn text(text: &str) -> Self {
        Self::Chunks(vec![Ok(StreamChunk::text(text)), Ok(StreamChunk::Done)])
    }

    /// Successful chunks only.
    pub fn chunks(chunks: Vec<StreamChunk>) -> Self {
        Self::Chunks(chunks.into_iter().map(Ok).collect())
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }

    /// A channel driven by the test at its own pace.
    pub fn feed() -> (Self, FeedHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Feed(rx), FeedHandle { tx })
    }
}

/// Sender side of a [`MockResponse::Feed`] channel.
#[derive(Clone)]
pub struct FeedHandle {
    tx: mpsc::UnboundedSender<Result<StreamChunk, ChannelError>>,
}

impl FeedHandle {
    /// Returns false once the consumer has dropped the channel.
    pub fn send(&self, chunk: StreamChunk) -> bool {
        self.tx.send(Ok(chunk)).is_ok()
    }

    pub fn fail(&self, error: ChannelError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// True once the consumer side is gone (request finished or cancelled).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Chunk source that hands out pre-programmed responses in call order and
/// records every request it was asked to open.
pub struct MockChunkSource {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<ChunkRequest>>,
    call_count: AtomicUsize,
}

impl MockChunkSource {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Queue another response behind the existing ones.
    pub fn push(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> Vec<ChunkRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChunkSource for MockChunkSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, request: ChunkRequest) -> Result<ChunkStream, ChannelError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(request);

        let response = self.responses.lock().pop_front();
        let Some(response) = response else {
            return Err(ChannelError::Network(format!(
                "MockChunkSource: no response configured for call {idx}"
            )));
        };

        resolve_response(response).await
    }
}

/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: MockResponse) -> Result<ChunkStream, ChannelError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Chunks(items) => return Ok(Box::pin(stream::iter(items))),
            MockResponse::Error(e) => return Err(e),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
            MockResponse::Feed(rx) => return Ok(Box::pin(UnboundedReceiverStream::new(rx))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::ids::{AgentId, RequestId};
    use tokio_stream::StreamExt;

    fn request(text: &str) -> ChunkRequest {
        ChunkRequest {
            request_id: RequestId::new(),
            agent_id: AgentId::new("general"),
            message: text.into(),
            conversation_id: None,
        }
    }

    async fn collect(stream: ChunkStream) -> Vec<Result<StreamChunk, ChannelError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn text_response_yields_text_then_done() {
        let source = MockChunkSource::new(vec![MockResponse::text("Hello")]);
        let items = collect(source.open(request("hi")).await.unwrap()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &StreamChunk::text("Hello"));
        assert_eq!(items[1].as_ref().unwrap(), &StreamChunk::Done);
    }

    #[tokio::test]
    async fn responses_are_consumed_in_order() {
        let source = MockChunkSource::new(vec![MockResponse::text("one"), MockResponse::text("two")]);
        let first = collect(source.open(request("a")).await.unwrap()).await;
        let second = collect(source.open(request("b")).await.unwrap()).await;
        assert_eq!(first[0].as_ref().unwrap(), &StreamChunk::text("one"));
        assert_eq!(second[0].as_ref().unwrap(), &StreamChunk::text("two"));
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_source_fails_open() {
        let source = MockChunkSource::new(vec![]);
        let result = source.open(request("a")).await;
        assert!(matches!(result, Err(ChannelError::Network(_))));
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn error_response_fails_open() {
        let source = MockChunkSource::new(vec![MockResponse::Error(ChannelError::from_status(
            500,
            "boom".into(),
        ))]);
        let result = source.open(request("a")).await;
        assert!(matches!(result, Err(ChannelError::Http { status: 500, .. })));
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let source = MockChunkSource::new(vec![MockResponse::text("x")]);
        let _ = source.open(request("what is rust")).await.unwrap();
        let recorded = source.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].message, "what is rust");
        assert_eq!(recorded[0].agent_id.as_str(), "general");
    }

    #[tokio::test]
    async fn delay_waits_before_opening() {
        tokio::time::pause();
        let source = MockChunkSource::new(vec![MockResponse::delayed(
            Duration::from_millis(200),
            MockResponse::text("late"),
        )]);
        let start = tokio::time::Instant::now();
        let stream = source.open(request("a")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
        let items = collect(stream).await;
        assert_eq!(items[0].as_ref().unwrap(), &StreamChunk::text("late"));
    }

    #[tokio::test]
    async fn feed_is_driven_by_handle() {
        let (response, feed) = MockResponse::feed();
        let source = MockChunkSource::new(vec![response]);
        let mut stream = source.open(request("a")).await.unwrap();

        assert!(feed.send(StreamChunk::status("Searching...")));
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            StreamChunk::status("Searching...")
        );

        assert!(feed.fail(ChannelError::Interrupted("reset".into())));
        assert!(stream.next().await.unwrap().is_err());

        drop(feed);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn feed_reports_closed_consumer() {
        let (response, feed) = MockResponse::feed();
        let source = MockChunkSource::new(vec![response]);
        let stream = source.open(request("a")).await.unwrap();
        assert!(!feed.is_closed());
        drop(stream);
        assert!(feed.is_closed());
        assert!(!feed.send(StreamChunk::Done));
    }
}
