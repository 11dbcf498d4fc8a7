use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Failures from the language-model backend, split so callers can decide
/// what is worth retrying.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("model temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("model call failed: {0}")]
    Failed(String),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

/// One prior exchange handed to the model as chat context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationConfig {
    /// Conversational replies.
    pub fn creative() -> Self {
        Self { temperature: 0.7, max_tokens: 1000 }
    }

    /// Single-token classification; temperature 0 so the label is stable.
    pub fn deterministic() -> Self {
        Self { temperature: 0.0, max_tokens: 50 }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, config: &GenerationConfig)
        -> Result<String, LlmError>;

    async fn chat(
        &self,
        system_instructions: &str,
        history: &[ChatTurn],
        query: &str,
        config: &GenerationConfig,
    ) -> Result<String, LlmError>;
}

/// Client for any OpenAI-compatible `/chat/completions` backend (OpenAI
/// itself, or a local Ollama endpoint).
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

impl HttpLlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Failed(format!("failed to create HTTP client: {error}")))?;

        Ok(Self { client, base_url: base_url.into(), api_key, model: model.into() })
    }

    async fn make_request(
        &self,
        messages: Vec<WireMessage>,
        config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = WireRequest {
            model: self.model.clone(),
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() || error.is_connect() {
                LlmError::Unavailable(error.to_string())
            } else {
                LlmError::Failed(error.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::Unavailable(format!("backend returned {status}")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::Failed(format!("backend returned {status}: {detail}")));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Failed(format!("failed to parse response: {error}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Failed("backend returned no choices".to_string()))
    }

    fn wire_history(
        system_instructions: &str,
        history: &[ChatTurn],
        query: &str,
    ) -> Vec<WireMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !system_instructions.trim().is_empty() {
            messages
                .push(WireMessage { role: "system", content: system_instructions.to_string() });
        }
        for turn in history {
            messages.push(WireMessage {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "assistant",
                },
                content: turn.content.clone(),
            });
        }
        messages.push(WireMessage { role: "user", content: query.to_string() });
        messages
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        let messages = vec![WireMessage { role: "user", content: prompt.to_string() }];
        self.make_request(messages, config).await
    }

    async fn chat(
        &self,
        system_instructions: &str,
        history: &[ChatTurn],
        query: &str,
        config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        let messages = Self::wire_history(system_instructions, history, query);
        self.make_request(messages, config).await
    }
}

/// Offline deterministic client for demos and smoke runs. Classifier
/// prompts get a stable label; everything else gets a canned reply.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubLlmClient;

const STUB_REPLY: &str =
    "Thanks for reaching out! A support teammate will follow up with details shortly.";

#[async_trait]
impl LlmClient for StubLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        if prompt.contains("intent classifier") {
            return Ok("Informational".to_string());
        }
        Ok(STUB_REPLY.to_string())
    }

    async fn chat(
        &self,
        _system_instructions: &str,
        _history: &[ChatTurn],
        _query: &str,
        _config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        Ok(STUB_REPLY.to_string())
    }
}

/// Test double that replays a queue of prepared outcomes and records every
/// call it receives.
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    Complete { prompt: String },
    Chat { system_instructions: String, history_len: usize, query: String },
}

impl ScriptedLlmClient {
    pub fn new(outcomes: Vec<Result<String, LlmError>>) -> Self {
        Self { script: Mutex::new(outcomes.into()), calls: Mutex::new(Vec::new()) }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| Ok(text.to_string())).collect())
    }

    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    async fn next_outcome(&self) -> Result<String, LlmError> {
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Failed("script exhausted".to_string())))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        self.calls.lock().await.push(RecordedCall::Complete { prompt: prompt.to_string() });
        self.next_outcome().await
    }

    async fn chat(
        &self,
        system_instructions: &str,
        history: &[ChatTurn],
        query: &str,
        _config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        self.calls.lock().await.push(RecordedCall::Chat {
            system_instructions: system_instructions.to_string(),
            history_len: history.len(),
            query: query.to_string(),
        });
        self.next_outcome().await
    }
}
