use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Status,
}

/// Whether a status line describes work still underway or an outcome.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    InProgress,
    Terminal,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Success,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub status: ToolStatus,
}

impl ToolCall {
    pub fn pending(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            input,
            output: None,
            status: ToolStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ToolStatus::Pending
    }
}

/// A citation attached to an assistant answer.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Any other fields the server attached, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One chat turn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRecord>,
    pub is_streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_kind: Option<StatusKind>,
    pub created_at: DateTime<Utc>,
}

// --- Convenience constructors ---

impl Message {
    fn base(role: Role, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            tool_calls: Vec::new(),
            sources: Vec::new(),
            is_streaming: false,
            error: None,
            status_kind: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::base(Role::User, text.into())
    }

    /// Placeholder assistant message shown while a request is in flight.
    pub fn assistant_placeholder(placeholder: impl Into<String>) -> Self {
        Self {
            is_streaming: true,
            ..Self::base(Role::Assistant, placeholder.into())
        }
    }

    /// A finished assistant message, as loaded back from persistence.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::base(Role::Assistant, text.into())
    }

    pub fn status(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            status_kind: Some(kind),
            ..Self::base(Role::Status, text.into())
        }
    }

    pub fn is_in_progress_status(&self) -> bool {
        self.role == Role::Status && self.status_kind == Some(StatusKind::InProgress)
    }

    /// Index of the earliest pending tool call with the given name.
    pub fn oldest_pending_tool(&self, name: &str) -> Option<usize> {
        self.tool_calls
            .iter()
            .position(|tc| tc.is_pending() && tc.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholder_is_streaming() {
        let msg = Message::assistant_placeholder("Working...");
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.is_streaming);
        assert_eq!(msg.content, "Working...");
        assert!(msg.error.is_none());
    }

    #[test]
    fn user_message_is_final() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, Role::User);
        assert!(!msg.is_streaming);
    }

    #[test]
    fn status_message_kind() {
        let msg = Message::status("Searching...", StatusKind::InProgress);
        assert!(msg.is_in_progress_status());
        let msg = Message::status("Search complete", StatusKind::Terminal);
        assert!(!msg.is_in_progress_status());
    }

    #[test]
    fn oldest_pending_tool_is_per_name() {
        let mut msg = Message::assistant_placeholder("");
        msg.tool_calls.push(ToolCall::pending("a", json!({"n": 1})));
        msg.tool_calls.push(ToolCall::pending("b", json!({})));
        msg.tool_calls.push(ToolCall::pending("a", json!({"n": 2})));
        assert_eq!(msg.oldest_pending_tool("a"), Some(0));
        assert_eq!(msg.oldest_pending_tool("b"), Some(1));

        msg.tool_calls[0].status = ToolStatus::Success;
        assert_eq!(msg.oldest_pending_tool("a"), Some(2));
        assert_eq!(msg.oldest_pending_tool("c"), None);
    }

    #[test]
    fn source_record_keeps_unknown_fields() {
        let src: SourceRecord =
            serde_json::from_value(json!({"title": "Doc", "url": "https://x", "score": 0.9})).unwrap();
        assert_eq!(src.title.as_deref(), Some("Doc"));
        assert_eq!(src.extra.get("score"), Some(&json!(0.9)));
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Status).unwrap(), "\"status\"");
        assert_eq!(serde_json::to_string(&ToolStatus::Pending).unwrap(), "\"pending\"");
    }
}
