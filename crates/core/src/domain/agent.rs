use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(DomainError::UnknownValue { kind: "agent status", value: other.to_string() }),
        }
    }
}

/// A configured support agent. Immutable for the duration of a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    pub persona: String,
    pub system_instructions: String,
    pub tools: Vec<String>,
    pub escalation_threshold: f64,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentProfile {
    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|enabled| enabled == tool_name)
    }
}

/// Create/update payload for an agent profile. Identity, status, and
/// timestamps are assigned by the directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentDraft {
    pub name: String,
    pub persona: String,
    pub system_instructions: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: f64,
}

fn default_escalation_threshold() -> f64 {
    0.5
}

impl AgentDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvariantViolation("agent name must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.escalation_threshold) {
            return Err(DomainError::ThresholdOutOfRange(self.escalation_threshold));
        }
        Ok(())
    }
}
