use chrono::Utc;
use tracing::instrument;

use chorus_core::ids::{AgentId, ConversationId};
use chorus_core::persistence::ConversationSummary;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const SUMMARY_COLUMNS: &str = "c.id, c.agent_id, c.title, c.created_at, c.updated_at,
     (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)";

pub struct ConversationRepo {
    db: Database,
}

impl ConversationRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an empty conversation owned by `agent_id`.
    #[instrument(skip(self, title), fields(agent_id = %agent_id))]
    pub fn create(&self, agent_id: &AgentId, title: &str) -> Result<ConversationSummary, StoreError> {
        let id = ConversationId::new();
        let now = Utc::now();
        let stamp = now.to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, agent_id, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.as_str(), agent_id.as_str(), title, stamp, stamp],
            )?;

            Ok(ConversationSummary {
                id,
                agent_id: agent_id.clone(),
                title: title.to_string(),
                message_count: 0,
                created_at: now,
                updated_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(conversation_id = %id))]
    pub fn get(&self, id: &ConversationId) -> Result<ConversationSummary, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {SUMMARY_COLUMNS} FROM conversations c WHERE c.id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_summary(row),
                None => Err(StoreError::NotFound(format!("conversation {id}"))),
            }
        })
    }

    /// Conversations for one agent, most recently updated first.
    #[instrument(skip(self), fields(agent_id = %agent_id))]
    pub fn list_for_agent(
        &self,
        agent_id: &AgentId,
        limit: u32,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS} FROM conversations c
                 WHERE c.agent_id = ?1
                 ORDER BY c.updated_at DESC, c.id DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(rusqlite::params![agent_id.as_str(), limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_summary(row)?);
            }
            Ok(results)
        })
    }

    /// Returns true if a row was removed. Messages cascade.
    #[instrument(skip(self), fields(conversation_id = %id))]
    pub fn delete(&self, id: &ConversationId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM conversations WHERE id = ?1", [id.as_str()])?;
            Ok(changed > 0)
        })
    }
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> Result<ConversationSummary, StoreError> {
    let id: String = row_helpers::get(row, 0, "conversations", "id")?;
    let agent_id: String = row_helpers::get(row, 1, "conversations", "agent_id")?;
    let created_at: String = row_helpers::get(row, 3, "conversations", "created_at")?;
    let updated_at: String = row_helpers::get(row, 4, "conversations", "updated_at")?;
    Ok(ConversationSummary {
        id: ConversationId::from_raw(id),
        agent_id: AgentId::new(agent_id),
        title: row_helpers::get(row, 2, "conversations", "title")?,
        message_count: row_helpers::get(row, 5, "conversations", "message_count")?,
        created_at: row_helpers::parse_timestamp(&created_at, "conversations", "created_at")?,
        updated_at: row_helpers::parse_timestamp(&updated_at, "conversations", "updated_at")?,
    })
}
