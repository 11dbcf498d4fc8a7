use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use helpdesk_core::domain::message::{Intent, MessageRole};
use helpdesk_core::errors::ApplicationError;
use helpdesk_db::repositories::{AgentDirectory, ConversationLog};

pub const DEFAULT_ACTIVITY_LIMIT: usize = 10;
const ACTIVITY_SNIPPET_CHARS: usize = 100;
const UNKNOWN_AGENT_NAME: &str = "Unknown";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResolutionMetrics {
    pub total_queries: u64,
    pub escalated_queries: u64,
    pub resolved_queries: u64,
    pub resolution_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub query: String,
    pub response: String,
    pub agent_name: String,
    pub intent: Intent,
    pub escalated: bool,
    pub timestamp: DateTime<Utc>,
}

/// Read-only roll-ups over the message log. Holds no state of its own, so
/// repeated calls with no intervening writes return identical results.
pub struct MetricsAggregator {
    log: Arc<dyn ConversationLog>,
    directory: Arc<dyn AgentDirectory>,
}

fn persistence(error: helpdesk_db::RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn snippet(content: &str) -> String {
    content.chars().take(ACTIVITY_SNIPPET_CHARS).collect()
}

impl MetricsAggregator {
    pub fn new(log: Arc<dyn ConversationLog>, directory: Arc<dyn AgentDirectory>) -> Self {
        Self { log, directory }
    }

    /// User messages count as queries; assistant messages flagged escalated
    /// count as escalated queries. Rate is rounded to one decimal and 0.0
    /// on an empty log.
    pub async fn resolution_metrics(&self) -> Result<ResolutionMetrics, ApplicationError> {
        let messages = self.log.list_all_messages().await.map_err(persistence)?;

        let total_queries =
            messages.iter().filter(|message| message.role == MessageRole::User).count() as u64;
        let escalated_queries = messages
            .iter()
            .filter(|message| message.role == MessageRole::Assistant && message.escalated)
            .count() as u64;
        let resolved_queries = total_queries.saturating_sub(escalated_queries);

        let resolution_rate = if total_queries == 0 {
            0.0
        } else {
            (resolved_queries as f64 / total_queries as f64 * 1000.0).round() / 10.0
        };

        Ok(ResolutionMetrics {
            total_queries,
            escalated_queries,
            resolved_queries,
            resolution_rate,
        })
    }

    /// Most recent assistant replies, newest first. Both `query` and
    /// `response` carry the truncated assistant content: the log does not
    /// keep the paired user text on this path.
    pub async fn recent_activity(
        &self,
        limit: usize,
    ) -> Result<Vec<ActivityEntry>, ApplicationError> {
        let messages = self.log.list_all_messages().await.map_err(persistence)?;

        let mut replies: Vec<_> =
            messages.iter().filter(|message| message.role == MessageRole::Assistant).collect();
        replies.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut activity = Vec::with_capacity(limit.min(replies.len()));
        for message in replies.into_iter().take(limit) {
            let agent_name = self
                .directory
                .find_by_id(&message.agent_id)
                .await
                .map_err(persistence)?
                .map(|profile| profile.name)
                .unwrap_or_else(|| UNKNOWN_AGENT_NAME.to_string());

            activity.push(ActivityEntry {
                query: snippet(&message.content),
                response: snippet(&message.content),
                agent_name,
                intent: message.intent,
                escalated: message.escalated,
                timestamp: message.timestamp,
            });
        }

        Ok(activity)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use helpdesk_core::domain::agent::AgentId;
    use helpdesk_core::domain::message::{Intent, Message, MessageId, MessageRole};
    use helpdesk_db::repositories::{
        AgentDirectory, ConversationLog, InMemoryAgentDirectory, InMemoryConversationLog,
    };

    use super::{MetricsAggregator, DEFAULT_ACTIVITY_LIMIT};

    async fn aggregator_with_log(
        log: Arc<InMemoryConversationLog>,
        directory: Arc<InMemoryAgentDirectory>,
    ) -> MetricsAggregator {
        MetricsAggregator::new(
            log as Arc<dyn ConversationLog>,
            directory as Arc<dyn AgentDirectory>,
        )
    }

    async fn append_turn(
        log: &InMemoryConversationLog,
        agent_id: &AgentId,
        content: &str,
        escalated: bool,
        offset_secs: i64,
    ) {
        let conversation =
            log.create_conversation(agent_id).await.expect("create conversation");
        let timestamp = Utc::now() + Duration::seconds(offset_secs);
        for role in [MessageRole::User, MessageRole::Assistant] {
            log.append_message(Message {
                id: MessageId::generate(),
                conversation_id: conversation.id.clone(),
                agent_id: agent_id.clone(),
                role,
                content: content.to_string(),
                intent: Intent::Informational,
                confidence_score: 0.9,
                timestamp,
                escalated: escalated && role == MessageRole::Assistant,
            })
            .await
            .expect("append message");
        }
    }

    #[tokio::test]
    async fn empty_log_yields_zeroes_without_division_error() {
        let log = Arc::new(InMemoryConversationLog::default());
        let directory = Arc::new(InMemoryAgentDirectory::default());
        let aggregator = aggregator_with_log(log, directory).await;

        let metrics = aggregator.resolution_metrics().await.expect("metrics");
        assert_eq!(metrics.total_queries, 0);
        assert_eq!(metrics.resolved_queries, 0);
        assert_eq!(metrics.escalated_queries, 0);
        assert_eq!(metrics.resolution_rate, 0.0);
    }

    #[tokio::test]
    async fn rate_counts_assistant_escalations_and_rounds_to_one_decimal() {
        let log = Arc::new(InMemoryConversationLog::default());
        let directory = Arc::new(InMemoryAgentDirectory::default());
        let agent_id = AgentId("agent-1".to_string());

        append_turn(&log, &agent_id, "turn one", false, 0).await;
        append_turn(&log, &agent_id, "turn two", false, 1).await;
        append_turn(&log, &agent_id, "turn three", true, 2).await;

        let aggregator = aggregator_with_log(Arc::clone(&log), directory).await;
        let metrics = aggregator.resolution_metrics().await.expect("metrics");

        assert_eq!(metrics.total_queries, 3);
        assert_eq!(metrics.escalated_queries, 1);
        assert_eq!(metrics.resolved_queries, 2);
        assert_eq!(metrics.resolution_rate, 66.7);
    }

    #[tokio::test]
    async fn metrics_are_idempotent_across_reads() {
        let log = Arc::new(InMemoryConversationLog::default());
        let directory = Arc::new(InMemoryAgentDirectory::default());
        let agent_id = AgentId("agent-1".to_string());
        append_turn(&log, &agent_id, "only turn", true, 0).await;

        let aggregator = aggregator_with_log(Arc::clone(&log), directory).await;
        let first = aggregator.resolution_metrics().await.expect("first read");
        let second = aggregator.resolution_metrics().await.expect("second read");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn activity_lists_newest_first_with_truncated_content() {
        let log = Arc::new(InMemoryConversationLog::default());
        let directory = Arc::new(InMemoryAgentDirectory::default());
        let agent_id = AgentId("agent-1".to_string());

        let long_reply = "x".repeat(240);
        append_turn(&log, &agent_id, "older turn", false, 0).await;
        append_turn(&log, &agent_id, &long_reply, false, 5).await;

        let aggregator = aggregator_with_log(Arc::clone(&log), directory).await;
        let activity =
            aggregator.recent_activity(DEFAULT_ACTIVITY_LIMIT).await.expect("activity");

        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].query.chars().count(), 100);
        // The source log keeps no paired user text here, so both fields
        // carry the assistant snippet.
        assert_eq!(activity[0].query, activity[0].response);
        assert_eq!(activity[1].query, "older turn");
        // Missing agent resolves to the placeholder name.
        assert_eq!(activity[0].agent_name, "Unknown");
    }

    #[tokio::test]
    async fn activity_respects_the_limit() {
        let log = Arc::new(InMemoryConversationLog::default());
        let directory = Arc::new(InMemoryAgentDirectory::default());
        let agent_id = AgentId("agent-1".to_string());

        for index in 0..15 {
            append_turn(&log, &agent_id, &format!("turn {index}"), false, index).await;
        }

        let aggregator = aggregator_with_log(Arc::clone(&log), directory).await;
        let activity =
            aggregator.recent_activity(DEFAULT_ACTIVITY_LIMIT).await.expect("activity");

        assert_eq!(activity.len(), DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(activity[0].query, "turn 14");
    }

    #[tokio::test]
    async fn activity_resolves_known_agent_names() {
        let log = Arc::new(InMemoryConversationLog::default());
        let directory = Arc::new(InMemoryAgentDirectory::default());

        let profile = directory
            .create(helpdesk_core::domain::agent::AgentDraft {
                name: "Aria".to_string(),
                persona: String::new(),
                system_instructions: String::new(),
                tools: Vec::new(),
                escalation_threshold: 0.5,
            })
            .await
            .expect("create agent");

        append_turn(&log, &profile.id, "a reply", false, 0).await;

        let aggregator = aggregator_with_log(Arc::clone(&log), Arc::clone(&directory)).await;
        let activity = aggregator.recent_activity(5).await.expect("activity");
        assert_eq!(activity[0].agent_name, "Aria");
    }
}
