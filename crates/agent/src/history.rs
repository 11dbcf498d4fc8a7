use helpdesk_core::domain::message::{Message, MessageRole};

use crate::llm::{ChatRole, ChatTurn};

/// Messages kept as model context per turn.
pub const DEFAULT_WINDOW: usize = 10;

/// Bounded chat context assembled from stored history. Entries with empty
/// content are dropped and any non-user role is normalized to the model
/// side before windowing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextWindow {
    turns: Vec<ChatTurn>,
}

impl ContextWindow {
    pub fn from_messages(messages: &[Message]) -> Self {
        Self::with_limit(messages, DEFAULT_WINDOW)
    }

    pub fn with_limit(messages: &[Message], limit: usize) -> Self {
        let turns: Vec<ChatTurn> = messages
            .iter()
            .filter(|message| !message.content.trim().is_empty())
            .map(|message| ChatTurn {
                role: match message.role {
                    MessageRole::User => ChatRole::User,
                    MessageRole::Assistant => ChatRole::Model,
                },
                content: message.content.clone(),
            })
            .collect();

        let start = turns.len().saturating_sub(limit);
        Self { turns: turns[start..].to_vec() }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
