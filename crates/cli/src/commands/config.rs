use std::env;

use helpdesk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line("database.url", &config.database.url, "HELPDESK_DATABASE_URL"));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        "HELPDESK_DATABASE_MAX_CONNECTIONS",
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        "HELPDESK_DATABASE_TIMEOUT_SECS",
    ));

    let provider = format!("{:?}", config.llm.provider).to_ascii_lowercase();
    lines.push(render_line("llm.provider", &provider, "HELPDESK_LLM_PROVIDER"));
    lines.push(render_line("llm.model", &config.llm.model, "HELPDESK_LLM_MODEL"));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("(unset)"),
        "HELPDESK_LLM_BASE_URL",
    ));
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact(key.expose_secret()))
        .unwrap_or_else(|| "(unset)".to_string());
    lines.push(render_line("llm.api_key", &api_key, "HELPDESK_LLM_API_KEY"));
    lines.push(render_line(
        "llm.max_attempts",
        &config.llm.max_attempts.to_string(),
        "HELPDESK_LLM_MAX_ATTEMPTS",
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        "HELPDESK_SERVER_BIND_ADDRESS",
    ));
    lines.push(render_line(
        "server.api_port",
        &config.server.api_port.to_string(),
        "HELPDESK_SERVER_API_PORT",
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        "HELPDESK_SERVER_HEALTH_CHECK_PORT",
    ));

    lines.push(render_line("logging.level", &config.logging.level, "HELPDESK_LOGGING_LEVEL"));

    lines.join("\n")
}

fn render_line(key: &str, value: &str, env_var: &str) -> String {
    let source = if env::var(env_var).map(|v| !v.trim().is_empty()).unwrap_or(false) {
        "env"
    } else {
        "file/default"
    };
    format!("  {key} = {value} [{source}]")
}

fn redact(secret: &str) -> String {
    if secret.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &secret[..4])
}
