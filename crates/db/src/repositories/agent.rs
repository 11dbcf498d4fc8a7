use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use helpdesk_core::domain::agent::{AgentDraft, AgentId, AgentProfile, AgentStatus};

use super::{AgentDirectory, RepositoryError};
use crate::DbPool;

pub struct SqlAgentDirectory {
    pool: DbPool,
}

impl SqlAgentDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const AGENT_COLUMNS: &str =
    "id, name, persona, system_instructions, tools, escalation_threshold, status, created_at, updated_at";

fn decode_agent_row(row: &SqliteRow) -> Result<AgentProfile, RepositoryError> {
    let tools_raw: String = row.try_get("tools")?;
    let tools: Vec<String> = serde_json::from_str(&tools_raw)
        .map_err(|error| RepositoryError::Decode(format!("agent tools column: {error}")))?;

    let status_raw: String = row.try_get("status")?;
    let status: AgentStatus =
        status_raw.parse().map_err(|error| RepositoryError::Decode(format!("{error}")))?;

    Ok(AgentProfile {
        id: AgentId(row.try_get("id")?),
        name: row.try_get("name")?,
        persona: row.try_get("persona")?,
        system_instructions: row.try_get("system_instructions")?,
        tools,
        escalation_threshold: row.try_get("escalation_threshold")?,
        status,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn encode_tools(tools: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(tools)
        .map_err(|error| RepositoryError::Decode(format!("agent tools column: {error}")))
}

#[async_trait::async_trait]
impl AgentDirectory for SqlAgentDirectory {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<AgentProfile>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM agent_profile WHERE id = ? AND status = 'active'"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_agent_row).transpose()
    }

    async fn list_active(&self) -> Result<Vec<AgentProfile>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM agent_profile WHERE status = 'active' ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_agent_row).collect()
    }

    async fn create(&self, draft: AgentDraft) -> Result<AgentProfile, RepositoryError> {
        let now = Utc::now();
        let profile = AgentProfile {
            id: AgentId::generate(),
            name: draft.name,
            persona: draft.persona,
            system_instructions: draft.system_instructions,
            tools: draft.tools,
            escalation_threshold: draft.escalation_threshold,
            status: AgentStatus::Active,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO agent_profile \
             (id, name, persona, system_instructions, tools, escalation_threshold, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&profile.id.0)
        .bind(&profile.name)
        .bind(&profile.persona)
        .bind(&profile.system_instructions)
        .bind(encode_tools(&profile.tools)?)
        .bind(profile.escalation_threshold)
        .bind(profile.status.as_str())
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn update(
        &self,
        id: &AgentId,
        draft: AgentDraft,
    ) -> Result<Option<AgentProfile>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE agent_profile \
             SET name = ?, persona = ?, system_instructions = ?, tools = ?, \
                 escalation_threshold = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&draft.name)
        .bind(&draft.persona)
        .bind(&draft.system_instructions)
        .bind(encode_tools(&draft.tools)?)
        .bind(draft.escalation_threshold)
        .bind(Utc::now())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM agent_profile WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(decode_agent_row).transpose()
    }

    async fn delete(&self, id: &AgentId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM agent_profile WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
