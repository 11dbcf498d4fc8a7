use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::conversation::ConversationId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(DomainError::UnknownValue { kind: "message role", value: other.to_string() }),
        }
    }
}

/// Classification of one user query. `Error` means the classifier call
/// itself failed; it is distinct from the `Informational` default so
/// callers can suppress classification-dependent branches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Informational,
    Transactional,
    Escalation,
    Error,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "Informational",
            Self::Transactional => "Transactional",
            Self::Escalation => "Escalation",
            Self::Error => "Error",
        }
    }
}

impl std::str::FromStr for Intent {
    type Err = DomainError;

    // Case-sensitive on purpose: the classifier contract requests exactly
    // one of these tokens, and stored rows must decode exactly.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Informational" => Ok(Self::Informational),
            "Transactional" => Ok(Self::Transactional),
            "Escalation" => Ok(Self::Escalation),
            "Error" => Ok(Self::Error),
            other => Err(DomainError::UnknownValue { kind: "intent", value: other.to_string() }),
        }
    }
}

/// One stored chat message. A turn appends a user/assistant pair sharing
/// the same timestamp, intent, and confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub agent_id: AgentId,
    pub role: MessageRole,
    pub content: String,
    pub intent: Intent,
    pub confidence_score: f64,
    pub timestamp: DateTime<Utc>,
    pub escalated: bool,
}

#[cfg(test)]
mod tests {
    use super::{Intent, MessageRole};

    #[test]
    fn intent_parse_is_case_sensitive() {
        assert_eq!("Escalation".parse::<Intent>().ok(), Some(Intent::Escalation));
        assert!("escalation".parse::<Intent>().is_err());
        assert!("ESCALATION".parse::<Intent>().is_err());
    }

    #[test]
    fn error_intent_is_its_own_value() {
        assert_eq!("Error".parse::<Intent>().ok(), Some(Intent::Error));
        assert_ne!(Intent::Error, Intent::Informational);
    }

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("assistant".parse::<MessageRole>().ok(), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::User.as_str(), "user");
        assert!("system".parse::<MessageRole>().is_err());
    }
}
