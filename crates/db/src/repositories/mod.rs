use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use helpdesk_core::domain::agent::{AgentDraft, AgentId, AgentProfile};
use helpdesk_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
use helpdesk_core::domain::escalation::Escalation;
use helpdesk_core::domain::message::Message;

pub mod agent;
pub mod conversation;
pub mod memory;

pub use agent::SqlAgentDirectory;
pub use conversation::SqlConversationLog;
pub use memory::{InMemoryAgentDirectory, InMemoryConversationLog};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Directory of configured support agents. `find_by_id` and `list_active`
/// only surface agents whose lifecycle status is `active`.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<AgentProfile>, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<AgentProfile>, RepositoryError>;
    async fn create(&self, draft: AgentDraft) -> Result<AgentProfile, RepositoryError>;
    async fn update(
        &self,
        id: &AgentId,
        draft: AgentDraft,
    ) -> Result<Option<AgentProfile>, RepositoryError>;
    async fn delete(&self, id: &AgentId) -> Result<bool, RepositoryError>;
}

/// Partial update for a conversation row; `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationUpdate {
    pub total_messages: Option<i64>,
    pub status: Option<ConversationStatus>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Append-only conversation log backing the turn pipeline: conversations,
/// time-ordered messages, and escalation records.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn find_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    async fn create_conversation(
        &self,
        agent_id: &AgentId,
    ) -> Result<Conversation, RepositoryError>;

    /// Conversations, most recently started first, optionally scoped to one agent.
    async fn list_conversations(
        &self,
        agent_id: Option<&AgentId>,
    ) -> Result<Vec<Conversation>, RepositoryError>;

    async fn update_conversation(
        &self,
        id: &ConversationId,
        update: ConversationUpdate,
    ) -> Result<bool, RepositoryError>;

    async fn append_message(&self, message: Message) -> Result<(), RepositoryError>;

    /// Messages of one conversation, ascending timestamp; messages sharing a
    /// timestamp keep insertion order (user before assistant within a turn).
    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError>;

    /// Every message in the log, same ordering contract as `list_messages`.
    async fn list_all_messages(&self) -> Result<Vec<Message>, RepositoryError>;

    async fn append_escalation(&self, escalation: Escalation) -> Result<(), RepositoryError>;

    /// Escalation records, most recent first.
    async fn list_escalations(&self) -> Result<Vec<Escalation>, RepositoryError>;
}
