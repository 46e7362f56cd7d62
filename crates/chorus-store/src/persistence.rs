use std::path::Path;

use async_trait::async_trait;

use chorus_core::errors::PersistenceError;
use chorus_core::ids::{AgentId, ConversationId};
use chorus_core::persistence::{
    Conversation, ConversationSummary, PersistedRole, PersistenceBridge, StoredMessage,
};

use crate::conversations::ConversationRepo;
use crate::database::Database;
use crate::error::StoreError;
use crate::messages::MessageRepo;

/// Conversations listed per agent are capped at this many.
const LIST_LIMIT: u32 = 200;

/// SQLite-backed [`PersistenceBridge`].
///
/// Repository calls are synchronous; each bridge call runs on the blocking
/// pool so the chunk-processing tasks never wait on disk I/O.
#[derive(Clone)]
pub struct SqlitePersistence {
    db: Database,
}

impl SqlitePersistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::in_memory()?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn run<F, T>(&self, f: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
            .map_err(PersistenceError::from)
    }
}

#[async_trait]
impl PersistenceBridge for SqlitePersistence {
    async fn create_conversation(
        &self,
        agent_id: &AgentId,
        title: &str,
    ) -> Result<ConversationId, PersistenceError> {
        let agent_id = agent_id.clone();
        let title = title.to_string();
        self.run(move |db| Ok(ConversationRepo::new(db).create(&agent_id, &title)?.id))
            .await
    }

    async fn add_message(
        &self,
        conversation_id: &ConversationId,
        role: PersistedRole,
        content: &str,
    ) -> Result<StoredMessage, PersistenceError> {
        let conversation_id = conversation_id.clone();
        let content = content.to_string();
        self.run(move |db| MessageRepo::new(db).append(&conversation_id, role, &content))
            .await
    }

    async fn get_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Conversation, PersistenceError> {
        let conversation_id = conversation_id.clone();
        self.run(move |db| {
            let summary = ConversationRepo::new(db.clone()).get(&conversation_id)?;
            let messages = MessageRepo::new(db).list(&conversation_id)?;
            Ok(Conversation {
                id: summary.id,
                agent_id: summary.agent_id,
                title: summary.title,
                created_at: summary.created_at,
                updated_at: summary.updated_at,
                messages,
            })
        })
        .await
    }

    async fn list_conversations(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<ConversationSummary>, PersistenceError> {
        let agent_id = agent_id.clone();
        self.run(move |db| ConversationRepo::new(db).list_for_agent(&agent_id, LIST_LIMIT))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_conversation_round_trip() {
        let store = SqlitePersistence::in_memory().unwrap();
        let agent = AgentId::new("research");

        let id = store.create_conversation(&agent, "hello").await.unwrap();
        let _ = store.add_message(&id, PersistedRole::User, "hello").await.unwrap();
        let _ = store
            .add_message(&id, PersistedRole::Assistant, "Hi there")
            .await
            .unwrap();

        let conv = store.get_conversation(&id).await.unwrap();
        assert_eq!(conv.agent_id, agent);
        assert_eq!(conv.title, "hello");
        let contents: Vec<&str> = conv.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "Hi there"]);

        let listed = store.list_conversations(&agent).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message_count, 2);
    }

    #[tokio::test]
    async fn missing_conversation_maps_to_not_found() {
        let store = SqlitePersistence::in_memory().unwrap();
        let err = store
            .get_conversation(&ConversationId::from_raw("conv_missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));

        let err = store
            .add_message(&ConversationId::from_raw("conv_missing"), PersistedRole::User, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
    }

    #[tokio::test]
    async fn clones_share_the_database() {
        let store = SqlitePersistence::in_memory().unwrap();
        let other = store.clone();
        let agent = AgentId::new("notes");
        let _ = store.create_conversation(&agent, "shared").await.unwrap();
        assert_eq!(other.list_conversations(&agent).await.unwrap().len(), 1);
    }
}
