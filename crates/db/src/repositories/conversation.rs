use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use helpdesk_core::domain::agent::AgentId;
use helpdesk_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
use helpdesk_core::domain::escalation::{
    Escalation, EscalationId, EscalationReason, EscalationStatus,
};
use helpdesk_core::domain::message::{Intent, Message, MessageId, MessageRole};

use super::{ConversationLog, ConversationUpdate, RepositoryError};
use crate::DbPool;

pub struct SqlConversationLog {
    pool: DbPool,
}

impl SqlConversationLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn decode_conversation_row(row: &SqliteRow) -> Result<Conversation, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    Ok(Conversation {
        id: ConversationId(row.try_get("id")?),
        agent_id: AgentId(row.try_get("agent_id")?),
        started_at: row.try_get::<DateTime<Utc>, _>("started_at")?,
        ended_at: row.try_get::<Option<DateTime<Utc>>, _>("ended_at")?,
        status: status_raw.parse::<ConversationStatus>().map_err(decode_error)?,
        total_messages: row.try_get("total_messages")?,
    })
}

fn decode_message_row(row: &SqliteRow) -> Result<Message, RepositoryError> {
    let role_raw: String = row.try_get("role")?;
    let intent_raw: String = row.try_get("intent")?;
    Ok(Message {
        id: MessageId(row.try_get("id")?),
        conversation_id: ConversationId(row.try_get("conversation_id")?),
        agent_id: AgentId(row.try_get("agent_id")?),
        role: role_raw.parse::<MessageRole>().map_err(decode_error)?,
        content: row.try_get("content")?,
        intent: intent_raw.parse::<Intent>().map_err(decode_error)?,
        confidence_score: row.try_get("confidence_score")?,
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        escalated: row.try_get("escalated")?,
    })
}

fn decode_escalation_row(row: &SqliteRow) -> Result<Escalation, RepositoryError> {
    let reason_raw: String = row.try_get("reason")?;
    let status_raw: String = row.try_get("status")?;
    Ok(Escalation {
        id: EscalationId(row.try_get("id")?),
        conversation_id: ConversationId(row.try_get("conversation_id")?),
        message_id: MessageId(row.try_get("message_id")?),
        agent_id: AgentId(row.try_get("agent_id")?),
        query: row.try_get("query")?,
        reason: reason_raw.parse::<EscalationReason>().map_err(decode_error)?,
        status: status_raw.parse::<EscalationStatus>().map_err(decode_error)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        resolved_at: row.try_get::<Option<DateTime<Utc>>, _>("resolved_at")?,
        resolved_by: row.try_get("resolved_by")?,
        resolution_notes: row.try_get("resolution_notes")?,
    })
}

const CONVERSATION_COLUMNS: &str = "id, agent_id, started_at, ended_at, status, total_messages";
const MESSAGE_COLUMNS: &str =
    "id, conversation_id, agent_id, role, content, intent, confidence_score, timestamp, escalated";
const ESCALATION_COLUMNS: &str = "id, conversation_id, message_id, agent_id, query, reason, \
     status, created_at, resolved_at, resolved_by, resolution_notes";

#[async_trait::async_trait]
impl ConversationLog for SqlConversationLog {
    async fn find_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {CONVERSATION_COLUMNS} FROM conversation WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(decode_conversation_row).transpose()
    }

    async fn create_conversation(
        &self,
        agent_id: &AgentId,
    ) -> Result<Conversation, RepositoryError> {
        let conversation = Conversation::begin(agent_id.clone(), Utc::now());

        sqlx::query(
            "INSERT INTO conversation (id, agent_id, started_at, ended_at, status, total_messages) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.agent_id.0)
        .bind(conversation.started_at)
        .bind(conversation.ended_at)
        .bind(conversation.status.as_str())
        .bind(conversation.total_messages)
        .execute(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn list_conversations(
        &self,
        agent_id: Option<&AgentId>,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {CONVERSATION_COLUMNS} FROM conversation"));
        if let Some(agent_id) = agent_id {
            builder.push(" WHERE agent_id = ").push_bind(&agent_id.0);
        }
        builder.push(" ORDER BY started_at DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_conversation_row).collect()
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        update: ConversationUpdate,
    ) -> Result<bool, RepositoryError> {
        if update == ConversationUpdate::default() {
            return Ok(self.find_conversation(id).await?.is_some());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE conversation SET ");
        let mut first = true;
        let mut push_field = |builder: &mut QueryBuilder<Sqlite>, field: &str| {
            if !first {
                builder.push(", ");
            }
            first = false;
            builder.push(field);
            builder.push(" = ");
        };

        if let Some(total_messages) = update.total_messages {
            push_field(&mut builder, "total_messages");
            builder.push_bind(total_messages);
        }
        if let Some(status) = update.status {
            push_field(&mut builder, "status");
            builder.push_bind(status.as_str());
        }
        if let Some(ended_at) = update.ended_at {
            push_field(&mut builder, "ended_at");
            builder.push_bind(ended_at);
        }

        builder.push(" WHERE id = ").push_bind(&id.0);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_message(&self, message: Message) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO message \
             (id, conversation_id, agent_id, role, content, intent, confidence_score, timestamp, escalated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id.0)
        .bind(&message.conversation_id.0)
        .bind(&message.agent_id.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.intent.as_str())
        .bind(message.confidence_score)
        .bind(message.timestamp)
        .bind(message.escalated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        // rowid breaks ties so the user message of a turn stays ahead of the
        // assistant message sharing its timestamp.
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM message WHERE conversation_id = ? \
             ORDER BY timestamp ASC, rowid ASC"
        ))
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_message_row).collect()
    }

    async fn list_all_messages(&self) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM message ORDER BY timestamp ASC, rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_message_row).collect()
    }

    async fn append_escalation(&self, escalation: Escalation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO escalation \
             (id, conversation_id, message_id, agent_id, query, reason, status, created_at, \
              resolved_at, resolved_by, resolution_notes) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&escalation.id.0)
        .bind(&escalation.conversation_id.0)
        .bind(&escalation.message_id.0)
        .bind(&escalation.agent_id.0)
        .bind(&escalation.query)
        .bind(escalation.reason.as_str())
        .bind(escalation.status.as_str())
        .bind(escalation.created_at)
        .bind(escalation.resolved_at)
        .bind(&escalation.resolved_by)
        .bind(&escalation.resolution_notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_escalations(&self) -> Result<Vec<Escalation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ESCALATION_COLUMNS} FROM escalation ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_escalation_row).collect()
    }
}
