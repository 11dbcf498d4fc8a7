//! JSON API surface.
//!
//! Endpoints (all JSON, under `/api/v1`):
//! - `POST /api/v1/chat`                                — process one conversation turn
//! - `POST /api/v1/agents` / `GET /api/v1/agents`       — create / list agents
//! - `GET|PUT|DELETE /api/v1/agents/{agent_id}`         — read / replace / remove one agent
//! - `GET /api/v1/analytics/metrics`                    — resolution roll-up
//! - `GET /api/v1/analytics/activity`                   — recent assistant replies
//! - `GET /api/v1/analytics/escalations`                — escalation queue
//! - `GET /api/v1/analytics/overview`                   — metrics + activity in one payload
//! - `GET /api/v1/conversations`                        — all conversations with agent names
//! - `GET /api/v1/conversations/agent/{agent_id}`       — conversations of one agent
//! - `GET /api/v1/conversations/{conversation_id}/messages` — ordered transcript
//! - `PUT /api/v1/conversations/{conversation_id}/resolve`  — mark resolved

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use helpdesk_agent::metrics::{ActivityEntry, MetricsAggregator, ResolutionMetrics};
use helpdesk_agent::orchestrator::{ConversationOrchestrator, TurnOutcome, TurnRequest};
use helpdesk_core::domain::agent::{AgentDraft, AgentId, AgentProfile};
use helpdesk_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
use helpdesk_core::domain::message::{Intent, Message};
use helpdesk_core::errors::{ApplicationError, InterfaceError};
use helpdesk_db::repositories::{AgentDirectory, ConversationLog, ConversationUpdate};
use helpdesk_db::RepositoryError;

#[derive(Clone)]
pub struct ApiState {
    pub directory: Arc<dyn AgentDirectory>,
    pub log: Arc<dyn ConversationLog>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub metrics: Arc<MetricsAggregator>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/agents", post(create_agent).get(list_agents))
        .route(
            "/api/v1/agents/{agent_id}",
            get(get_agent).put(update_agent).delete(delete_agent),
        )
        .route("/api/v1/analytics/metrics", get(analytics_metrics))
        .route("/api/v1/analytics/activity", get(analytics_activity))
        .route("/api/v1/analytics/escalations", get(analytics_escalations))
        .route("/api/v1/analytics/overview", get(analytics_overview))
        .route("/api/v1/conversations", get(list_all_conversations))
        .route("/api/v1/conversations/agent/{agent_id}", get(list_agent_conversations))
        .route("/api/v1/conversations/{conversation_id}/messages", get(list_conversation_messages))
        .route("/api/v1/conversations/{conversation_id}/resolve", put(resolve_conversation))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub agent_id: String,
    pub query: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: Intent,
    pub confidence_score: f64,
    pub escalated: bool,
    pub conversation_id: String,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            response: outcome.response,
            intent: outcome.intent,
            confidence_score: outcome.confidence_score,
            escalated: outcome.escalated,
            conversation_id: outcome.conversation_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ConversationStatus,
    pub total_messages: i64,
}

#[derive(Debug, Serialize)]
pub struct EscalationView {
    pub id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub query: String,
    pub reason: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsOverview {
    pub metrics: ResolutionMetrics,
    pub activity: Vec<ActivityEntry>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn not_found(entity: &str) -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError { error: format!("{entity} not found") }))
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { error: message.into() }))
}

fn repository_failure(error: RepositoryError) -> (StatusCode, Json<ApiError>) {
    let correlation_id = Uuid::new_v4().to_string();
    error!(
        event_name = "api.repository_failure",
        correlation_id = %correlation_id,
        error = %error,
        "repository operation failed"
    );
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError {
            error: "The service is temporarily unavailable. Please retry shortly.".to_string(),
        }),
    )
}

fn application_failure(error: ApplicationError) -> (StatusCode, Json<ApiError>) {
    let correlation_id = Uuid::new_v4().to_string();
    let interface = error.into_interface(correlation_id.clone());
    error!(
        event_name = "api.application_failure",
        correlation_id = %correlation_id,
        error = %interface,
        "request failed"
    );
    let status = match &interface {
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiError { error: interface.user_message().to_string() }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Helpdesk agentic backend is running" }))
}

async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    info!(
        event_name = "api.chat_received",
        agent_id = %request.agent_id,
        "received chat request"
    );

    let outcome = state
        .orchestrator
        .handle_turn(TurnRequest {
            agent_id: AgentId(request.agent_id),
            query: request.query,
            conversation_id: request.conversation_id.map(ConversationId),
        })
        .await
        .map_err(application_failure)?;

    info!(
        event_name = "api.chat_processed",
        intent = outcome.intent.as_str(),
        escalated = outcome.escalated,
        "chat processed"
    );
    Ok(Json(ChatResponse::from(outcome)))
}

async fn create_agent(
    State(state): State<ApiState>,
    Json(draft): Json<AgentDraft>,
) -> ApiResult<AgentProfile> {
    draft.validate().map_err(|error| bad_request(error.to_string()))?;
    let profile = state.directory.create(draft).await.map_err(repository_failure)?;
    info!(event_name = "api.agent_created", agent_id = %profile.id, "agent created");
    Ok(Json(profile))
}

async fn list_agents(State(state): State<ApiState>) -> ApiResult<Vec<AgentProfile>> {
    let agents = state.directory.list_active().await.map_err(repository_failure)?;
    Ok(Json(agents))
}

async fn get_agent(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
) -> ApiResult<AgentProfile> {
    state
        .directory
        .find_by_id(&AgentId(agent_id))
        .await
        .map_err(repository_failure)?
        .map(Json)
        .ok_or_else(|| not_found("Agent"))
}

async fn update_agent(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
    Json(draft): Json<AgentDraft>,
) -> ApiResult<AgentProfile> {
    draft.validate().map_err(|error| bad_request(error.to_string()))?;
    state
        .directory
        .update(&AgentId(agent_id), draft)
        .await
        .map_err(repository_failure)?
        .map(Json)
        .ok_or_else(|| not_found("Agent"))
}

async fn delete_agent(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let deleted =
        state.directory.delete(&AgentId(agent_id)).await.map_err(repository_failure)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Agent"))
    }
}

async fn analytics_metrics(State(state): State<ApiState>) -> ApiResult<ResolutionMetrics> {
    let metrics = state.metrics.resolution_metrics().await.map_err(application_failure)?;
    Ok(Json(metrics))
}

async fn analytics_activity(State(state): State<ApiState>) -> ApiResult<Vec<ActivityEntry>> {
    let activity = state
        .metrics
        .recent_activity(helpdesk_agent::metrics::DEFAULT_ACTIVITY_LIMIT)
        .await
        .map_err(application_failure)?;
    Ok(Json(activity))
}

async fn analytics_escalations(State(state): State<ApiState>) -> ApiResult<Vec<EscalationView>> {
    let escalations = state.log.list_escalations().await.map_err(repository_failure)?;

    let views = escalations
        .into_iter()
        .map(|escalation| EscalationView {
            id: escalation.id.0,
            conversation_id: escalation.conversation_id.0,
            message_id: escalation.message_id.0,
            query: escalation.query,
            reason: escalation.reason.as_str().to_string(),
            status: capitalize(escalation.status.as_str()),
            created_at: escalation.created_at,
        })
        .collect();

    Ok(Json(views))
}

async fn analytics_overview(State(state): State<ApiState>) -> ApiResult<AnalyticsOverview> {
    let metrics = state.metrics.resolution_metrics().await.map_err(application_failure)?;
    let activity = state
        .metrics
        .recent_activity(helpdesk_agent::metrics::DEFAULT_ACTIVITY_LIMIT)
        .await
        .map_err(application_failure)?;
    Ok(Json(AnalyticsOverview { metrics, activity }))
}

async fn list_all_conversations(State(state): State<ApiState>) -> ApiResult<Vec<ConversationView>> {
    let conversations = state.log.list_conversations(None).await.map_err(repository_failure)?;
    let agents = state.directory.list_active().await.map_err(repository_failure)?;
    Ok(Json(conversation_views(conversations, &agents)))
}

async fn list_agent_conversations(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Vec<ConversationView>> {
    let agent_id = AgentId(agent_id);
    let conversations =
        state.log.list_conversations(Some(&agent_id)).await.map_err(repository_failure)?;
    let agents = state.directory.list_active().await.map_err(repository_failure)?;
    Ok(Json(conversation_views(conversations, &agents)))
}

async fn list_conversation_messages(
    State(state): State<ApiState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Vec<Message>> {
    let messages = state
        .log
        .list_messages(&ConversationId(conversation_id))
        .await
        .map_err(repository_failure)?;
    Ok(Json(messages))
}

async fn resolve_conversation(
    State(state): State<ApiState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let resolved = state
        .log
        .update_conversation(
            &ConversationId(conversation_id.clone()),
            ConversationUpdate {
                status: Some(ConversationStatus::Resolved),
                ended_at: Some(Utc::now()),
                ..ConversationUpdate::default()
            },
        )
        .await
        .map_err(repository_failure)?;

    if !resolved {
        return Err(not_found("Conversation"));
    }

    info!(
        event_name = "api.conversation_resolved",
        conversation_id = %conversation_id,
        "conversation marked resolved"
    );
    Ok(Json(serde_json::json!({ "message": "Conversation resolved successfully" })))
}

fn conversation_views(
    conversations: Vec<Conversation>,
    agents: &[AgentProfile],
) -> Vec<ConversationView> {
    conversations
        .into_iter()
        .map(|conversation| {
            let agent_name = agents
                .iter()
                .find(|agent| agent.id == conversation.agent_id)
                .map(|agent| agent.name.clone())
                .unwrap_or_else(|| "Unknown Agent".to_string());
            ConversationView {
                id: conversation.id.0,
                agent_id: conversation.agent_id.0,
                agent_name,
                started_at: conversation.started_at,
                ended_at: conversation.ended_at,
                status: conversation.status,
                total_messages: conversation.total_messages,
            }
        })
        .collect()
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::util::ServiceExt;

    use helpdesk_agent::gateway::LanguageModelGateway;
    use helpdesk_agent::llm::ScriptedLlmClient;
    use helpdesk_agent::metrics::MetricsAggregator;
    use helpdesk_agent::orchestrator::ConversationOrchestrator;
    use helpdesk_agent::retry::RetryPolicy;
    use helpdesk_core::domain::agent::AgentDraft;
    use helpdesk_db::repositories::{
        AgentDirectory, ConversationLog, InMemoryAgentDirectory, InMemoryConversationLog,
    };

    use super::{router, ApiState};

    fn state_with_script(replies: &[&str]) -> (ApiState, Arc<InMemoryAgentDirectory>) {
        let directory = Arc::new(InMemoryAgentDirectory::default());
        let log = Arc::new(InMemoryConversationLog::default());
        let gateway = LanguageModelGateway::new(
            Arc::new(ScriptedLlmClient::replying(replies)),
            RetryPolicy::new(3, Duration::from_millis(1)),
        );

        let shared_directory: Arc<dyn AgentDirectory> = Arc::clone(&directory) as _;
        let shared_log: Arc<dyn ConversationLog> = Arc::clone(&log) as _;
        let orchestrator = Arc::new(ConversationOrchestrator::new(
            Arc::clone(&shared_directory),
            Arc::clone(&shared_log),
            gateway,
        ));
        let metrics = Arc::new(MetricsAggregator::new(
            Arc::clone(&shared_log),
            Arc::clone(&shared_directory),
        ));

        (
            ApiState {
                directory: shared_directory,
                log: shared_log,
                orchestrator,
                metrics,
            },
            directory,
        )
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body should collect");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    async fn seed_agent(directory: &InMemoryAgentDirectory, tools: &[&str]) -> String {
        directory
            .create(AgentDraft {
                name: "Aria".to_string(),
                persona: String::new(),
                system_instructions: "Help with orders.".to_string(),
                tools: tools.iter().map(|tool| tool.to_string()).collect(),
                escalation_threshold: 0.5,
            })
            .await
            .expect("seed agent")
            .id
            .0
    }

    #[tokio::test]
    async fn chat_turn_round_trips_through_the_router() {
        let (state, directory) = state_with_script(&["Escalation"]);
        let agent_id = seed_agent(&directory, &[]).await;
        let app = router(state);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "agent_id": agent_id, "query": "I want a manager" }),
            ))
            .await
            .expect("request should succeed");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = response_json(response).await;
        assert_eq!(payload["intent"], "Escalation");
        assert_eq!(payload["escalated"], true);
        assert_eq!(payload["response"], "I am escalating this to a human agent. Please wait.");
        assert!(payload["conversation_id"].as_str().map(|id| !id.is_empty()).unwrap_or(false));
    }

    #[tokio::test]
    async fn chat_with_unknown_agent_returns_error_shaped_payload() {
        let (state, _directory) = state_with_script(&["Informational"]);
        let app = router(state);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "agent_id": "missing", "query": "hello" }),
            ))
            .await
            .expect("request should succeed");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = response_json(response).await;
        assert_eq!(payload["intent"], "Error");
        assert_eq!(payload["response"], "Agent not found");
        assert_eq!(payload["conversation_id"], "");
    }

    #[tokio::test]
    async fn agent_crud_flow() {
        let (state, _directory) = state_with_script(&[]);
        let app = router(state);

        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/agents",
                serde_json::json!({
                    "name": "Billing Bot",
                    "persona": "precise",
                    "system_instructions": "Explain charges.",
                    "tools": ["initiate_refund"],
                    "escalation_threshold": 0.7
                }),
            ))
            .await
            .expect("create should succeed");
        assert_eq!(created.status(), StatusCode::OK);
        let created_payload = response_json(created).await;
        let agent_id = created_payload["id"].as_str().expect("id present").to_string();

        let fetched = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/agents/{agent_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("get should succeed");
        assert_eq!(fetched.status(), StatusCode::OK);
        let fetched_payload = response_json(fetched).await;
        assert_eq!(fetched_payload["name"], "Billing Bot");

        let deleted = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/agents/{agent_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("delete should succeed");
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let missing = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/agents/{agent_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("get should respond");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn agent_create_rejects_out_of_range_threshold() {
        let (state, _directory) = state_with_script(&[]);
        let app = router(state);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/agents",
                serde_json::json!({
                    "name": "Broken",
                    "persona": "",
                    "system_instructions": "",
                    "escalation_threshold": 2.0
                }),
            ))
            .await
            .expect("request should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analytics_overview_combines_metrics_and_activity() {
        let (state, directory) = state_with_script(&["Informational", "All good."]);
        let agent_id = seed_agent(&directory, &[]).await;
        let app = router(state);

        let chat = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "agent_id": agent_id, "query": "hello" }),
            ))
            .await
            .expect("chat should succeed");
        assert_eq!(chat.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/analytics/overview")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("overview should respond");
        assert_eq!(response.status(), StatusCode::OK);

        let payload = response_json(response).await;
        assert_eq!(payload["metrics"]["total_queries"], 1);
        assert_eq!(payload["metrics"]["resolution_rate"], 100.0);
        assert_eq!(payload["activity"].as_array().map(Vec::len), Some(1));
        assert_eq!(payload["activity"][0]["agent_name"], "Aria");
    }

    #[tokio::test]
    async fn conversation_endpoints_list_and_resolve() {
        let (state, directory) = state_with_script(&["Informational", "Sure thing."]);
        let agent_id = seed_agent(&directory, &[]).await;
        let app = router(state);

        let chat = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "agent_id": agent_id, "query": "hello" }),
            ))
            .await
            .expect("chat should succeed");
        let chat_payload = response_json(chat).await;
        let conversation_id =
            chat_payload["conversation_id"].as_str().expect("conversation id").to_string();

        let listed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/conversations")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("list should respond");
        let listed_payload = response_json(listed).await;
        assert_eq!(listed_payload.as_array().map(Vec::len), Some(1));
        assert_eq!(listed_payload[0]["agent_name"], "Aria");
        assert_eq!(listed_payload[0]["total_messages"], 2);

        let messages = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/conversations/{conversation_id}/messages"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("messages should respond");
        let messages_payload = response_json(messages).await;
        assert_eq!(messages_payload.as_array().map(Vec::len), Some(2));
        assert_eq!(messages_payload[0]["role"], "user");
        assert_eq!(messages_payload[1]["role"], "assistant");

        let resolved = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/api/v1/conversations/{conversation_id}/resolve"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("resolve should respond");
        assert_eq!(resolved.status(), StatusCode::OK);

        let missing = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/conversations/never-created/resolve")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("resolve should respond");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
