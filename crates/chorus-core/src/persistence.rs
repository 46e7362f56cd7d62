use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PersistenceError;
use crate::ids::{AgentId, ConversationId};

/// Roles accepted by the persistence layer. Status lines are never persisted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersistedRole {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for PersistedRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for PersistedRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: ConversationId,
    pub role: PersistedRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub agent_id: AgentId,
    pub title: String,
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub agent_id: AgentId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<StoredMessage>,
}

/// Durable conversation storage as seen by the orchestration core.
///
/// Calls from the core are fire-and-forget: an `Err` is logged by the caller
/// and never rolls back or fails a chat turn.
#[async_trait]
pub trait PersistenceBridge: Send + Sync {
    async fn create_conversation(
        &self,
        agent_id: &AgentId,
        title: &str,
    ) -> Result<ConversationId, PersistenceError>;

    async fn add_message(
        &self,
        conversation_id: &ConversationId,
        role: PersistedRole,
        content: &str,
    ) -> Result<StoredMessage, PersistenceError>;

    async fn get_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Conversation, PersistenceError>;

    async fn list_conversations(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<ConversationSummary>, PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display_and_parse() {
        for role in [PersistedRole::User, PersistedRole::Assistant, PersistedRole::System] {
            let parsed: PersistedRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("status".parse::<PersistedRole>().is_err());
    }
}
