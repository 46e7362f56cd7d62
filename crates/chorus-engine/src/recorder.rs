use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use chorus_core::errors::PersistenceError;
use chorus_core::ids::{AgentId, ConversationId};
use chorus_core::persistence::{
    Conversation, ConversationSummary, PersistedRole, PersistenceBridge,
};

/// Fire-and-forget wrapper over a [`PersistenceBridge`].
///
/// Write failures are logged and swallowed: persistence never rolls back or
/// fails a chat turn.
#[derive(Clone)]
pub struct ConversationRecorder {
    bridge: Arc<dyn PersistenceBridge>,
}

impl ConversationRecorder {
    pub fn new(bridge: Arc<dyn PersistenceBridge>) -> Self {
        Self { bridge }
    }

    pub async fn open(&self, agent_id: &AgentId, title: &str) -> Option<ConversationId> {
        match self.bridge.create_conversation(agent_id, title).await {
            Ok(id) => {
                debug!(agent_id = %agent_id, conversation_id = %id, "conversation created");
                Some(id)
            }
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "failed to create conversation");
                None
            }
        }
    }

    /// Returns true if the message was stored.
    pub async fn record(&self, conversation_id: &ConversationId, role: PersistedRole, content: &str) -> bool {
        match self.bridge.add_message(conversation_id, role, content).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    role = %role,
                    error = %e,
                    "failed to persist message"
                );
                false
            }
        }
    }

    /// [`record`](Self::record) on a background task.
    pub fn spawn_record(
        &self,
        conversation_id: ConversationId,
        role: PersistedRole,
        content: String,
    ) -> JoinHandle<bool> {
        let recorder = self.clone();
        tokio::spawn(async move { recorder.record(&conversation_id, role, &content).await })
    }

    pub async fn load(&self, conversation_id: &ConversationId) -> Result<Conversation, PersistenceError> {
        self.bridge.get_conversation(conversation_id).await
    }

    pub async fn list(&self, agent_id: &AgentId) -> Result<Vec<ConversationSummary>, PersistenceError> {
        self.bridge.list_conversations(agent_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chorus_core::persistence::StoredMessage;

    struct Unavailable;

    #[async_trait]
    impl PersistenceBridge for Unavailable {
        async fn create_conversation(
            &self,
            _agent_id: &AgentId,
            _title: &str,
        ) -> Result<ConversationId, PersistenceError> {
            Err(PersistenceError::Storage("disk full".into()))
        }

        async fn add_message(
            &self,
            _conversation_id: &ConversationId,
            _role: PersistedRole,
            _content: &str,
        ) -> Result<StoredMessage, PersistenceError> {
            Err(PersistenceError::Storage("disk full".into()))
        }

        async fn get_conversation(
            &self,
            conversation_id: &ConversationId,
        ) -> Result<Conversation, PersistenceError> {
            Err(PersistenceError::NotFound(conversation_id.to_string()))
        }

        async fn list_conversations(
            &self,
            _agent_id: &AgentId,
        ) -> Result<Vec<ConversationSummary>, PersistenceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let recorder = ConversationRecorder::new(Arc::new(Unavailable));
        assert!(recorder.open(&AgentId::new("general"), "t").await.is_none());

        let conv = ConversationId::from_raw("conv_1");
        assert!(!recorder.record(&conv, PersistedRole::User, "hi").await);
        assert!(!recorder
            .spawn_record(conv, PersistedRole::Assistant, "yo".into())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn load_errors_are_returned() {
        let recorder = ConversationRecorder::new(Arc::new(Unavailable));
        let err = recorder.load(&ConversationId::from_raw("conv_9")).await.unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
    }
}
