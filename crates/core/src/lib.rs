pub mod config;
pub mod domain;
pub mod errors;

pub use domain::agent::{AgentDraft, AgentId, AgentProfile, AgentStatus};
pub use domain::conversation::{Conversation, ConversationId, ConversationStatus};
pub use domain::escalation::{Escalation, EscalationId, EscalationReason, EscalationStatus};
pub use domain::message::{Intent, Message, MessageId, MessageRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
