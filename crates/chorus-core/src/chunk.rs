use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::{Artifact, ArtifactKind};
use crate::errors::ChannelError;
use crate::messages::SourceRecord;

/// Fallback text for an `error` chunk that carries no message.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// One event on a chunk channel, exactly as it travels on the wire.
///
/// Every field except `chunk_type` is optional; which ones are meaningful
/// depends on the type. Use [`StreamChunk::from`] to get the typed view.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WireChunk {
    pub chunk_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Typed chunk events. Ordering contract per channel is arrival order only:
///
/// (Thinking | ToolCall | ToolResult | Text | Sources | Artifact | Status)* → (Done | Error)?
///
/// A channel may also end without a terminal chunk.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamChunk {
    Thinking { content: String },
    ToolCall { name: String, input: Value },
    ToolResult { name: String, output: String },
    Text { content: String },
    Sources { sources: Vec<SourceRecord> },
    Artifact(Artifact),
    Status { content: String },
    Error { message: String },
    Done,
    /// A `chunk_type` this build does not know. Ignored by the processor.
    Unknown { chunk_type: String },
}

impl StreamChunk {
    /// Decode one JSON object into a typed chunk.
    pub fn from_json(raw: &str) -> Result<Self, ChannelError> {
        let wire: WireChunk =
            serde_json::from_str(raw).map_err(|e| ChannelError::Malformed(e.to_string()))?;
        Ok(wire.into())
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text { content: content.into() }
    }

    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking { content: content.into() }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self::Status { content: content.into() }
    }

    pub fn tool_call(name: impl Into<String>, input: Value) -> Self {
        Self::ToolCall { name: name.into(), input }
    }

    pub fn tool_result(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ToolResult { name: name.into(), output: output.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// The wire `chunk_type` of this chunk.
    pub fn kind(&self) -> &str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Text { .. } => "text",
            Self::Sources { .. } => "sources",
            Self::Artifact(_) => "artifact",
            Self::Status { .. } => "status",
            Self::Error { .. } => "error",
            Self::Done => "done",
            Self::Unknown { chunk_type } => chunk_type,
        }
    }
}

impl From<WireChunk> for StreamChunk {
    fn from(w: WireChunk) -> Self {
        let content = w.content.unwrap_or_default();
        match w.chunk_type.as_str() {
            "thinking" => Self::Thinking { content },
            "tool_call" => Self::ToolCall {
                name: w.tool_name.unwrap_or_default(),
                input: w.tool_input.unwrap_or(Value::Null),
            },
            "tool_result" => Self::ToolResult {
                name: w.tool_name.unwrap_or_default(),
                output: match w.tool_output {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => content,
                },
            },
            "text" => Self::Text { content },
            "sources" => Self::Sources {
                sources: w.sources.unwrap_or_default(),
            },
            "artifact" => Self::Artifact(Artifact {
                id: w.artifact_id,
                kind: ArtifactKind::parse(w.artifact_type.as_deref()),
                title: w.artifact_title,
                language: w.artifact_language,
                content,
                metadata: w.metadata,
            }),
            "status" => Self::Status { content },
            "error" => Self::Error {
                message: if content.is_empty() {
                    UNKNOWN_ERROR.to_string()
                } else {
                    content
                },
            },
            "done" => Self::Done,
            other => Self::Unknown {
                chunk_type: other.to_string(),
            },
        }
    }
}
