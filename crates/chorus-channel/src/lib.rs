//! Chunk channel transports: SSE over HTTP and a scriptable mock.

pub mod http;
pub mod mock;
pub mod sse;

pub use http::{HttpChunkSource, HttpSourceConfig};
pub use mock::{FeedHandle, MockChunkSource, MockResponse};
pub use sse::SseDecoder;
