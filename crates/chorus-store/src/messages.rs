use chrono::Utc;
use tracing::instrument;

use chorus_core::ids::{ConversationId, MessageId};
use chorus_core::persistence::{PersistedRole, StoredMessage};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

pub struct MessageRepo {
    db: Database,
}

impl MessageRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a message and bump the conversation's `updated_at`.
    #[instrument(skip(self, content), fields(conversation_id = %conversation_id, role = %role))]
    pub fn append(
        &self,
        conversation_id: &ConversationId,
        role: PersistedRole,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let id = MessageId::new();
        let now = Utc::now();
        let stamp = now.to_rfc3339();

        self.db.with_tx(|tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
                [conversation_id.as_str()],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(format!("conversation {conversation_id}")));
            }

            let sequence: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sequence), 0) + 1 FROM messages WHERE conversation_id = ?1",
                [conversation_id.as_str()],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO messages (id, conversation_id, sequence, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.as_str(),
                    conversation_id.as_str(),
                    sequence,
                    role.to_string(),
                    content,
                    stamp,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                rusqlite::params![stamp, conversation_id.as_str()],
            )?;

            Ok(StoredMessage {
                id: id.to_string(),
                conversation_id: conversation_id.clone(),
                role,
                content: content.to_string(),
                created_at: now,
            })
        })
    }

    /// All messages of a conversation in insertion order.
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub fn list(&self, conversation_id: &ConversationId) -> Result<Vec<StoredMessage>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, created_at
                 FROM messages WHERE conversation_id = ?1 ORDER BY sequence ASC",
            )?;
            let mut rows = stmt.query([conversation_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_message(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<StoredMessage, StoreError> {
    let conversation_id: String = row_helpers::get(row, 1, "messages", "conversation_id")?;
    let role: String = row_helpers::get(row, 2, "messages", "role")?;
    let created_at: String = row_helpers::get(row, 4, "messages", "created_at")?;
    Ok(StoredMessage {
        id: row_helpers::get(row, 0, "messages", "id")?,
        conversation_id: ConversationId::from_raw(conversation_id),
        role: row_helpers::parse_enum(&role, "messages", "role")?,
        content: row_helpers::get(row, 3, "messages", "content")?,
        created_at: row_helpers::parse_timestamp(&created_at, "messages", "created_at")?,
    })
}
