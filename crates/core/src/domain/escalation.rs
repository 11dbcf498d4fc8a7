use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::conversation::ConversationId;
use crate::domain::message::MessageId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscalationId(pub String);

impl EscalationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationReason {
    UserRequest,
    LowConfidence,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRequest => "User Request",
            Self::LowConfidence => "Low Confidence",
        }
    }
}

impl std::str::FromStr for EscalationReason {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "User Request" => Ok(Self::UserRequest),
            "Low Confidence" => Ok(Self::LowConfidence),
            other => Err(DomainError::UnknownValue {
                kind: "escalation reason",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Pending,
    Resolved,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }
}

impl std::str::FromStr for EscalationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            other => Err(DomainError::UnknownValue {
                kind: "escalation status",
                value: other.to_string(),
            }),
        }
    }
}

/// A hand-off to a human operator. Created at most once per escalated
/// turn, referencing that turn's assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: EscalationId,
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub agent_id: AgentId,
    pub query: String,
    pub reason: EscalationReason,
    pub status: EscalationStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}
