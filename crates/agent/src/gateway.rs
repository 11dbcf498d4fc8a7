use std::sync::Arc;

use tracing::{error, warn};

use helpdesk_core::domain::message::{Intent, Message};

use crate::history::ContextWindow;
use crate::llm::{GenerationConfig, LlmClient};
use crate::retry::RetryPolicy;

/// Fixed degradation text: returned whenever generation fails for good,
/// instead of surfacing an error to the end user.
pub const APOLOGY: &str =
    "I apologize, but I encountered an error while processing your request.";

fn classifier_prompt(query: &str) -> String {
    format!(
        "You are an intent classifier. Return exactly one of: Escalation, Transactional, Informational.\n\
         \n\
         Rules (highest priority first):\n\
         - If the user explicitly asks to escalate, speak to a human/manager/agent, or requests to transfer/hand off/raise a ticket, classify as Escalation.\n\
         - Otherwise if the user wants an action performed (check status, process refund, change booking, etc.), classify as Transactional.\n\
         - Otherwise, classify as Informational.\n\
         \n\
         User query: {query}\n\
         \n\
         Respond with only the single word: Escalation, Transactional, or Informational."
    )
}

/// Front door to the language model: intent classification plus the two
/// generation paths, with bounded-retry-then-degrade semantics.
pub struct LanguageModelGateway {
    client: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl LanguageModelGateway {
    pub fn new(client: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Classify one query. Unknown labels fall back to `Informational`;
    /// a failed call is reported as `Intent::Error` so callers can skip
    /// classification-dependent branches.
    pub async fn classify_intent(&self, query: &str) -> Intent {
        let prompt = classifier_prompt(query);

        match self.client.complete(&prompt, &GenerationConfig::deterministic()).await {
            Ok(raw) => {
                let label = raw.trim();
                match label {
                    "Escalation" => Intent::Escalation,
                    "Transactional" => Intent::Transactional,
                    "Informational" => Intent::Informational,
                    other => {
                        warn!(
                            event_name = "llm.classifier_label_invalid",
                            label = other,
                            "classifier returned an unknown label, defaulting to Informational"
                        );
                        Intent::Informational
                    }
                }
            }
            Err(error) => {
                error!(
                    event_name = "llm.classification_failed",
                    error = %error,
                    "intent classification failed"
                );
                Intent::Error
            }
        }
    }

    /// Single-shot generation. Never errors: retry exhaustion and fatal
    /// failures both collapse to the fixed apology.
    pub async fn generate(&self, prompt: &str) -> String {
        let config = GenerationConfig::creative();
        match self.retry.run(|| self.client.complete(prompt, &config)).await {
            Ok(text) => text,
            Err(error) => {
                error!(
                    event_name = "llm.generation_failed",
                    error = %error,
                    "generation failed after retries"
                );
                APOLOGY.to_string()
            }
        }
    }

    /// History-aware generation. A non-empty window opens a chat seeded with
    /// prior turns; an empty one falls back to a single composed prompt.
    pub async fn generate_with_history(
        &self,
        system_instructions: &str,
        history: &[Message],
        query: &str,
    ) -> String {
        let window = ContextWindow::from_messages(history);

        if window.is_empty() {
            let prompt = format!("{system_instructions}\nUser: {query}");
            return self.generate(&prompt).await;
        }

        let config = GenerationConfig::creative();
        match self
            .retry
            .run(|| self.client.chat(system_instructions, window.turns(), query, &config))
            .await
        {
            Ok(text) => text,
            Err(error) => {
                error!(
                    event_name = "llm.chat_generation_failed",
                    error = %error,
                    history_len = window.len(),
                    "chat generation failed after retries"
                );
                APOLOGY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use helpdesk_core::domain::agent::AgentId;
    use helpdesk_core::domain::conversation::ConversationId;
    use helpdesk_core::domain::message::{Intent, Message, MessageId, MessageRole};

    use super::{LanguageModelGateway, APOLOGY};
    use crate::llm::{LlmError, RecordedCall, ScriptedLlmClient};
    use crate::retry::RetryPolicy;

    fn gateway_with(client: Arc<ScriptedLlmClient>) -> LanguageModelGateway {
        LanguageModelGateway::new(client, RetryPolicy::new(3, Duration::from_millis(1)))
    }

    fn history_fixture() -> Vec<Message> {
        [(MessageRole::User, "hi"), (MessageRole::Assistant, "hello, how can I help?")]
            .into_iter()
            .map(|(role, content)| Message {
                id: MessageId::generate(),
                conversation_id: ConversationId("conv-1".to_string()),
                agent_id: AgentId("agent-1".to_string()),
                role,
                content: content.to_string(),
                intent: Intent::Informational,
                confidence_score: 0.9,
                timestamp: Utc::now(),
                escalated: false,
            })
            .collect()
    }

    #[tokio::test]
    async fn classification_maps_known_labels() {
        for (label, expected) in [
            ("Escalation", Intent::Escalation),
            ("Transactional", Intent::Transactional),
            ("Informational", Intent::Informational),
        ] {
            let client = Arc::new(ScriptedLlmClient::replying(&[label]));
            let gateway = gateway_with(client);
            assert_eq!(gateway.classify_intent("anything").await, expected);
        }
    }

    #[tokio::test]
    async fn unknown_label_defaults_to_informational() {
        let client = Arc::new(ScriptedLlmClient::replying(&["Greeting"]));
        let gateway = gateway_with(client);
        assert_eq!(gateway.classify_intent("hi").await, Intent::Informational);
    }

    #[tokio::test]
    async fn lowercase_label_is_not_accepted() {
        let client = Arc::new(ScriptedLlmClient::replying(&["escalation"]));
        let gateway = gateway_with(client);
        assert_eq!(gateway.classify_intent("hi").await, Intent::Informational);
    }

    #[tokio::test]
    async fn classification_failure_yields_error_intent() {
        let client = Arc::new(ScriptedLlmClient::new(vec![Err(LlmError::Failed(
            "boom".to_string(),
        ))]));
        let gateway = gateway_with(client);
        assert_eq!(gateway.classify_intent("hi").await, Intent::Error);
    }

    #[tokio::test]
    async fn generation_retries_transient_failures_then_succeeds() {
        let client = Arc::new(ScriptedLlmClient::new(vec![
            Err(LlmError::Unavailable("503".to_string())),
            Err(LlmError::Unavailable("503".to_string())),
            Ok("recovered".to_string()),
        ]));
        let gateway = gateway_with(Arc::clone(&client));

        assert_eq!(gateway.generate("prompt").await, "recovered");
        assert_eq!(client.recorded_calls().await.len(), 3);
    }

    #[tokio::test]
    async fn generation_exhaustion_degrades_to_apology() {
        let client = Arc::new(ScriptedLlmClient::new(vec![
            Err(LlmError::Unavailable("503".to_string())),
            Err(LlmError::Unavailable("503".to_string())),
            Err(LlmError::Unavailable("503".to_string())),
        ]));
        let gateway = gateway_with(Arc::clone(&client));

        assert_eq!(gateway.generate("prompt").await, APOLOGY);
        assert_eq!(client.recorded_calls().await.len(), 3);
    }

    #[tokio::test]
    async fn fatal_generation_failure_degrades_without_retry() {
        let client = Arc::new(ScriptedLlmClient::new(vec![Err(LlmError::Failed(
            "bad request".to_string(),
        ))]));
        let gateway = gateway_with(Arc::clone(&client));

        assert_eq!(gateway.generate("prompt").await, APOLOGY);
        assert_eq!(client.recorded_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn non_empty_history_uses_the_chat_path() {
        let client = Arc::new(ScriptedLlmClient::replying(&["contextual answer"]));
        let gateway = gateway_with(Arc::clone(&client));

        let reply = gateway
            .generate_with_history("be helpful", &history_fixture(), "and my refund?")
            .await;

        assert_eq!(reply, "contextual answer");
        let calls = client.recorded_calls().await;
        assert!(matches!(
            &calls[0],
            RecordedCall::Chat { history_len: 2, query, .. } if query == "and my refund?"
        ));
    }

    #[tokio::test]
    async fn empty_history_falls_back_to_a_composed_prompt() {
        let client = Arc::new(ScriptedLlmClient::replying(&["fresh answer"]));
        let gateway = gateway_with(Arc::clone(&client));

        let reply = gateway.generate_with_history("be helpful", &[], "hello there").await;

        assert_eq!(reply, "fresh answer");
        let calls = client.recorded_calls().await;
        assert!(matches!(
            &calls[0],
            RecordedCall::Complete { prompt }
                if prompt.starts_with("be helpful") && prompt.ends_with("User: hello there")
        ));
    }
}
