use bytes::BytesMut;

use chorus_core::chunk::StreamChunk;
use chorus_core::errors::ChannelError;

/// Data payload some servers send as the last frame. Channel exhaustion is
/// already treated as completion, so the sentinel carries no chunk.
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder for `text/event-stream` bodies whose `data:` lines hold
/// one JSON chunk object each.
///
/// Raw bytes are buffered and only complete lines are decoded as UTF-8, so a
/// read that ends inside a multi-byte character is never mangled. A blank
/// line dispatches the `data:` lines gathered since the previous one.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every chunk completed by them, in order.
    pub fn push(&mut self, bytes: impl AsRef<[u8]>) -> Vec<Result<StreamChunk, ChannelError>> {
        self.buffer.extend_from_slice(bytes.as_ref());

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            self.take_line(&line, &mut out);
        }
        out
    }

    /// Flush a trailing frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Vec<Result<StreamChunk, ChannelError>> {
        let mut out = Vec::new();
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            self.take_line(&rest, &mut out);
        }
        out.extend(self.dispatch());
        out
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || self.data.is_some()
    }

    fn take_line(&mut self, raw: &[u8], out: &mut Vec<Result<StreamChunk, ChannelError>>) {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                out.push(Err(ChannelError::Malformed(format!("invalid UTF-8 in event stream: {e}"))));
                return;
            }
        };
        if line.is_empty() {
            out.extend(self.dispatch());
            return;
        }
        // Comments and fields other than `data` are ignored.
        let Some(rest) = line.strip_prefix("data:") else {
            return;
        };
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        match &mut self.data {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(rest);
            }
            None => self.data = Some(rest.to_string()),
        }
    }

    fn dispatch(&mut self) -> Option<Result<StreamChunk, ChannelError>> {
        let data = self.data.take()?;
        let data = data.trim();
        if data.is_empty() || data == DONE_SENTINEL {
            return None;
        }
        Some(StreamChunk::from_json(data))
    }
}
