use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use helpdesk_core::domain::agent::{AgentDraft, AgentId, AgentProfile, AgentStatus};
use helpdesk_core::domain::conversation::{Conversation, ConversationId};
use helpdesk_core::domain::escalation::Escalation;
use helpdesk_core::domain::message::Message;

use super::{AgentDirectory, ConversationLog, ConversationUpdate, RepositoryError};

#[derive(Default)]
pub struct InMemoryAgentDirectory {
    agents: RwLock<HashMap<String, AgentProfile>>,
}

impl InMemoryAgentDirectory {
    /// Test helper: place a fully-formed profile directly in the directory.
    pub async fn insert(&self, profile: AgentProfile) {
        let mut agents = self.agents.write().await;
        agents.insert(profile.id.0.clone(), profile);
    }
}

#[async_trait::async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<AgentProfile>, RepositoryError> {
        let agents = self.agents.read().await;
        Ok(agents.get(&id.0).filter(|profile| profile.status == AgentStatus::Active).cloned())
    }

    async fn list_active(&self) -> Result<Vec<AgentProfile>, RepositoryError> {
        let agents = self.agents.read().await;
        let mut active: Vec<AgentProfile> =
            agents.values().filter(|profile| profile.status == AgentStatus::Active).cloned().collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(active)
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

        let mut agents = self.agents.write().await;
        agents.insert(profile.id.0.clone(), profile.clone());
        Ok(profile)
    }

    async fn update(
        &self,
        id: &AgentId,
        draft: AgentDraft,
    ) -> Result<Option<AgentProfile>, RepositoryError> {
        let mut agents = self.agents.write().await;
        let Some(profile) = agents.get_mut(&id.0) else {
            return Ok(None);
        };

        profile.name = draft.name;
        profile.persona = draft.persona;
        profile.system_instructions = draft.system_instructions;
        profile.tools = draft.tools;
        profile.escalation_threshold = draft.escalation_threshold;
        profile.updated_at = Utc::now();

        Ok(Some(profile.clone()))
    }

    async fn delete(&self, id: &AgentId) -> Result<bool, RepositoryError> {
        let mut agents = self.agents.write().await;
        Ok(agents.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryConversationLog {
    conversations: RwLock<HashMap<String, Conversation>>,
    messages: RwLock<Vec<Message>>,
    escalations: RwLock<Vec<Escalation>>,
}

#[async_trait::async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn find_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).cloned())
    }

    async fn create_conversation(
        &self,
        agent_id: &AgentId,
    ) -> Result<Conversation, RepositoryError> {
        let conversation = Conversation::begin(agent_id.clone(), Utc::now());
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id.0.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn list_conversations(
        &self,
        agent_id: Option<&AgentId>,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        let mut selected: Vec<Conversation> = conversations
            .values()
            .filter(|conversation| {
                agent_id.map(|agent_id| &conversation.agent_id == agent_id).unwrap_or(true)
            })
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(selected)
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        update: ConversationUpdate,
    ) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.write().await;
        let Some(conversation) = conversations.get_mut(&id.0) else {
            return Ok(false);
        };

        if let Some(total_messages) = update.total_messages {
            conversation.total_messages = total_messages;
        }
        if let Some(status) = update.status {
            conversation.status = status;
        }
        if let Some(ended_at) = update.ended_at {
            conversation.ended_at = Some(ended_at);
        }

        Ok(true)
    }

    async fn append_message(&self, message: Message) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.push(message);
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut selected: Vec<Message> = messages
            .iter()
            .filter(|message| &message.conversation_id == conversation_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        selected.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(selected)
    }

    async fn list_all_messages(&self) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut all = messages.clone();
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(all)
    }

    async fn append_escalation(&self, escalation: Escalation) -> Result<(), RepositoryError> {
        let mut escalations = self.escalations.write().await;
        escalations.push(escalation);
        Ok(())
    }

    async fn list_escalations(&self) -> Result<Vec<Escalation>, RepositoryError> {
        let escalations = self.escalations.read().await;
        let mut all = escalations.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use helpdesk_core::domain::agent::{AgentDraft, AgentId};
    use helpdesk_core::domain::message::{Intent, Message, MessageId, MessageRole};

    use super::{InMemoryAgentDirectory, InMemoryConversationLog};
    use crate::repositories::{AgentDirectory, ConversationLog};

    #[tokio::test]
    async fn in_memory_directory_round_trip() {
        let directory = InMemoryAgentDirectory::default();
        let created = directory
            .create(AgentDraft {
                name: "Aria".to_string(),
                persona: String::new(),
                system_instructions: String::new(),
                tools: vec!["send_email".to_string()],
                escalation_threshold: 0.5,
            })
            .await
            .expect("create agent");

        let found = directory.find_by_id(&created.id).await.expect("find agent");
        assert_eq!(found.as_ref().map(|profile| profile.name.as_str()), Some("Aria"));

        assert!(directory.delete(&created.id).await.expect("delete"));
        assert!(directory.find_by_id(&created.id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn in_memory_log_preserves_pair_order_for_equal_timestamps() {
        let log = InMemoryConversationLog::default();
        let agent_id = AgentId("agent-1".to_string());
        let conversation = log.create_conversation(&agent_id).await.expect("create conversation");

        let timestamp = Utc::now();
        for (role, content) in
            [(MessageRole::User, "hello"), (MessageRole::Assistant, "hi there")]
        {
            log.append_message(Message {
                id: MessageId::generate(),
                conversation_id: conversation.id.clone(),
                agent_id: agent_id.clone(),
                role,
                content: content.to_string(),
                intent: Intent::Informational,
                confidence_score: 0.9,
                timestamp,
                escalated: false,
            })
            .await
            .expect("append message");
        }

        let messages = log.list_messages(&conversation.id).await.expect("list messages");
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }
}
