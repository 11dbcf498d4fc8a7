use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use helpdesk_agent::gateway::LanguageModelGateway;
use helpdesk_agent::llm::{HttpLlmClient, LlmClient, LlmError, StubLlmClient};
use helpdesk_agent::metrics::MetricsAggregator;
use helpdesk_agent::orchestrator::ConversationOrchestrator;
use helpdesk_agent::retry::RetryPolicy;
use helpdesk_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use helpdesk_db::repositories::{AgentDirectory, ConversationLog};
use helpdesk_db::{connect_with_settings, migrations, DbPool, SqlAgentDirectory, SqlConversationLog};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub directory: Arc<dyn AgentDirectory>,
    pub log: Arc<dyn ConversationLog>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub metrics: Arc<MetricsAggregator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client init failed: {0}")]
    LlmClient(#[source] LlmError),
}

fn build_llm_client(config: &AppConfig) -> Result<Arc<dyn LlmClient>, BootstrapError> {
    let llm = &config.llm;
    match llm.provider {
        LlmProvider::OpenAi => {
            let base_url =
                llm.base_url.clone().unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            let client =
                HttpLlmClient::new(base_url, llm.api_key.clone(), &llm.model, llm.timeout_secs)
                    .map_err(BootstrapError::LlmClient)?;
            Ok(Arc::new(client))
        }
        LlmProvider::Ollama => {
            let base_url =
                llm.base_url.clone().unwrap_or_else(|| "http://localhost:11434/v1".to_string());
            let client = HttpLlmClient::new(base_url, None, &llm.model, llm.timeout_secs)
                .map_err(BootstrapError::LlmClient)?;
            Ok(Arc::new(client))
        }
        LlmProvider::Stub => Ok(Arc::new(StubLlmClient)),
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let directory: Arc<dyn AgentDirectory> = Arc::new(SqlAgentDirectory::new(db_pool.clone()));
    let log: Arc<dyn ConversationLog> = Arc::new(SqlConversationLog::new(db_pool.clone()));

    let llm_client = build_llm_client(&config)?;
    let retry = RetryPolicy::new(
        config.llm.max_attempts,
        std::time::Duration::from_secs(config.llm.retry_pause_secs),
    );
    let gateway = LanguageModelGateway::new(llm_client, retry);

    let orchestrator = Arc::new(ConversationOrchestrator::new(
        Arc::clone(&directory),
        Arc::clone(&log),
        gateway,
    ));
    let metrics = Arc::new(MetricsAggregator::new(Arc::clone(&log), Arc::clone(&directory)));

    Ok(Application { config, db_pool, directory, log, orchestrator, metrics })
}
