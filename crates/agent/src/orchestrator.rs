use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use helpdesk_core::domain::agent::{AgentId, AgentProfile};
use helpdesk_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
use helpdesk_core::domain::escalation::{
    Escalation, EscalationId, EscalationReason, EscalationStatus,
};
use helpdesk_core::domain::message::{Intent, Message, MessageId, MessageRole};
use helpdesk_core::errors::ApplicationError;
use helpdesk_db::repositories::{
    AgentDirectory, ConversationLog, ConversationUpdate, RepositoryError,
};

use crate::escalation::EscalationPolicy;
use crate::gateway::LanguageModelGateway;
use crate::tools::{ToolDispatcher, NO_TOOL_ACCESS_REPLY};

/// Turn-level confidence. Fixed until a live confidence model exists; the
/// threshold comparison still runs against it every turn.
pub const TURN_CONFIDENCE: f64 = 0.9;

const AGENT_NOT_FOUND_REPLY: &str = "Agent not found";

#[derive(Clone, Debug, PartialEq)]
pub struct TurnRequest {
    pub agent_id: AgentId,
    pub query: String,
    pub conversation_id: Option<ConversationId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub response: String,
    pub intent: Intent,
    pub confidence_score: f64,
    pub escalated: bool,
    pub conversation_id: String,
}

impl TurnOutcome {
    fn agent_not_found() -> Self {
        Self {
            response: AGENT_NOT_FOUND_REPLY.to_string(),
            intent: Intent::Error,
            confidence_score: 0.0,
            escalated: false,
            conversation_id: String::new(),
        }
    }
}

/// Per-conversation turn serialization. Turns on the same conversation id
/// take the same async mutex from history read through the final write, so
/// the count read-modify-write cannot interleave; distinct conversations
/// proceed independently.
#[derive(Default)]
struct TurnLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnLocks {
    async fn acquire(&self, id: &ConversationId) -> OwnedMutexGuard<()> {
        let handle = {
            let mut map = self.inner.lock().await;
            map.entry(id.0.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        handle.lock_owned().await
    }
}

/// Composes gateway, tool dispatch, escalation policy, and the conversation
/// log into the single `handle_turn` entry point.
pub struct ConversationOrchestrator {
    directory: Arc<dyn AgentDirectory>,
    log: Arc<dyn ConversationLog>,
    gateway: LanguageModelGateway,
    tools: ToolDispatcher,
    policy: EscalationPolicy,
    turn_locks: TurnLocks,
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

impl ConversationOrchestrator {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        log: Arc<dyn ConversationLog>,
        gateway: LanguageModelGateway,
    ) -> Self {
        Self {
            directory,
            log,
            gateway,
            tools: ToolDispatcher,
            policy: EscalationPolicy,
            turn_locks: TurnLocks::default(),
        }
    }

    /// Process one turn. Only an unresolvable agent/conversation aborts
    /// before any write; model and persistence trouble degrade in place.
    pub async fn handle_turn(
        &self,
        request: TurnRequest,
    ) -> Result<TurnOutcome, ApplicationError> {
        let Some(agent) =
            self.directory.find_by_id(&request.agent_id).await.map_err(persistence)?
        else {
            warn!(
                event_name = "turn.agent_not_found",
                agent_id = %request.agent_id,
                "turn rejected, unknown agent"
            );
            return Ok(TurnOutcome::agent_not_found());
        };

        let conversation =
            self.resolve_or_create_conversation(&agent, request.conversation_id.as_ref()).await?;
        let _turn_guard = self.turn_locks.acquire(&conversation.id).await;

        let prior_history =
            self.log.list_messages(&conversation.id).await.map_err(persistence)?;

        let intent = self.gateway.classify_intent(&request.query).await;
        info!(
            event_name = "turn.intent_classified",
            conversation_id = %conversation.id,
            intent = intent.as_str(),
            "intent classified"
        );

        let mut decision = self.policy.for_intent(intent);
        let mut response_text = if let Some(text) = decision.override_text {
            info!(
                event_name = "turn.escalation_requested",
                conversation_id = %conversation.id,
                "explicit escalation request"
            );
            text.to_string()
        } else if intent == Intent::Transactional {
            self.dispatch_tool(&agent, &conversation.id, &request.query)
        } else {
            // Informational, plus the best-effort path for Error intents.
            self.gateway
                .generate_with_history(&agent.system_instructions, &prior_history, &request.query)
                .await
        };

        let confidence = TURN_CONFIDENCE;
        let confidence_decision =
            self.policy.for_confidence(confidence, agent.escalation_threshold);
        if let Some(text) = confidence_decision.override_text {
            warn!(
                event_name = "turn.confidence_below_threshold",
                conversation_id = %conversation.id,
                confidence,
                threshold = agent.escalation_threshold,
                "confidence below agent threshold, escalating"
            );
            response_text = text.to_string();
        }
        decision = decision.merge(confidence_decision);

        let escalated = decision.escalate;
        let timestamp = Utc::now();

        let user_message = Message {
            id: MessageId::generate(),
            conversation_id: conversation.id.clone(),
            agent_id: agent.id.clone(),
            role: MessageRole::User,
            content: request.query.clone(),
            intent,
            confidence_score: confidence,
            timestamp,
            escalated,
        };
        let assistant_message = Message {
            id: MessageId::generate(),
            conversation_id: conversation.id.clone(),
            agent_id: agent.id.clone(),
            role: MessageRole::Assistant,
            content: response_text.clone(),
            intent,
            confidence_score: confidence,
            timestamp,
            escalated,
        };
        let assistant_message_id = assistant_message.id.clone();

        // Persistence from here on is best-effort: failures are logged and
        // already-written rows stay (no compensating rollback).
        if let Err(error) = self.log.append_message(user_message).await {
            warn!(
                event_name = "turn.user_message_write_failed",
                conversation_id = %conversation.id,
                error = %error,
                "failed to store user message, continuing"
            );
        }
        if let Err(error) = self.log.append_message(assistant_message).await {
            warn!(
                event_name = "turn.assistant_message_write_failed",
                conversation_id = %conversation.id,
                error = %error,
                "failed to store assistant message, continuing"
            );
        }

        let update = ConversationUpdate {
            total_messages: Some(prior_history.len() as i64 + 2),
            status: escalated.then_some(ConversationStatus::Escalated),
            ended_at: escalated.then_some(timestamp),
        };
        if let Err(error) = self.log.update_conversation(&conversation.id, update).await {
            warn!(
                event_name = "turn.conversation_update_failed",
                conversation_id = %conversation.id,
                error = %error,
                "failed to update conversation, continuing"
            );
        }

        if escalated {
            let reason = decision.reason.unwrap_or(EscalationReason::LowConfidence);
            let escalation = Escalation {
                id: EscalationId::generate(),
                conversation_id: conversation.id.clone(),
                message_id: assistant_message_id,
                agent_id: agent.id.clone(),
                query: request.query.clone(),
                reason,
                status: EscalationStatus::Pending,
                created_at: timestamp,
                resolved_at: None,
                resolved_by: None,
                resolution_notes: None,
            };
            match self.log.append_escalation(escalation).await {
                Ok(()) => info!(
                    event_name = "turn.escalation_recorded",
                    conversation_id = %conversation.id,
                    reason = reason.as_str(),
                    "escalation recorded"
                ),
                Err(error) => warn!(
                    event_name = "turn.escalation_write_failed",
                    conversation_id = %conversation.id,
                    error = %error,
                    "failed to store escalation record, continuing"
                ),
            }
        }

        Ok(TurnOutcome {
            response: response_text,
            intent,
            confidence_score: confidence,
            escalated,
            conversation_id: conversation.id.0,
        })
    }

    async fn resolve_or_create_conversation(
        &self,
        agent: &AgentProfile,
        supplied: Option<&ConversationId>,
    ) -> Result<Conversation, ApplicationError> {
        if let Some(id) = supplied {
            if let Some(existing) =
                self.log.find_conversation(id).await.map_err(persistence)?
            {
                if existing.agent_id != agent.id {
                    // Reuse is intentionally not blocked; the mismatch is
                    // surfaced for operators.
                    warn!(
                        event_name = "turn.conversation_owner_mismatch",
                        conversation_id = %existing.id,
                        owner_agent_id = %existing.agent_id,
                        requested_agent_id = %agent.id,
                        "conversation reused by a different agent"
                    );
                }
                info!(
                    event_name = "turn.conversation_reused",
                    conversation_id = %existing.id,
                    "using existing conversation"
                );
                return Ok(existing);
            }
        }

        let conversation =
            self.log.create_conversation(&agent.id).await.map_err(persistence)?;
        info!(
            event_name = "turn.conversation_created",
            conversation_id = %conversation.id,
            agent_id = %agent.id,
            "created new conversation"
        );
        Ok(conversation)
    }

    fn dispatch_tool(
        &self,
        agent: &AgentProfile,
        conversation_id: &ConversationId,
        query: &str,
    ) -> String {
        match self.tools.match_query(query) {
            Some(tool) if self.tools.is_available(tool, agent) => {
                info!(
                    event_name = "turn.tool_executed",
                    conversation_id = %conversation_id,
                    tool = tool.as_str(),
                    "executing tool"
                );
                self.tools.execute(tool).to_string()
            }
            matched => {
                info!(
                    event_name = "turn.tool_unavailable",
                    conversation_id = %conversation_id,
                    matched_tool = matched.map(|tool| tool.as_str()).unwrap_or("none"),
                    "no available tool matched, offering escalation"
                );
                NO_TOOL_ACCESS_REPLY.to_string()
            }
        }
    }
}
