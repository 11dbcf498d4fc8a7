use std::env;
use std::sync::{Mutex, OnceLock};

use helpdesk_cli::commands::{migrate, seed, start};
use serde_json::Value;

#[test]
fn start_returns_success_with_valid_env() {
    with_env(&[("HELPDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "expected successful start preflight");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn start_returns_config_failure_with_invalid_provider() {
    with_env(
        &[
            ("HELPDESK_DATABASE_URL", "sqlite::memory:"),
            ("HELPDESK_LLM_PROVIDER", "not-a-provider"),
        ],
        || {
            let result = start::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "start");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("HELPDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn seed_creates_demo_agents_against_fresh_database() {
    with_env(&[("HELPDESK_DATABASE_URL", "sqlite::memory:?cache=shared")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected successful seed run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("2 created"), "unexpected seed summary: {message}");
    });
}

#[test]
fn start_reports_connectivity_failure_for_unwritable_database() {
    with_env(
        &[("HELPDESK_DATABASE_URL", "sqlite:///nonexistent-dir/helpdesk.db")],
        || {
            let result = start::run();
            assert_eq!(result.exit_code, 4, "expected db connectivity failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "db_connectivity");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "HELPDESK_DATABASE_URL",
        "HELPDESK_DATABASE_MAX_CONNECTIONS",
        "HELPDESK_DATABASE_TIMEOUT_SECS",
        "HELPDESK_LLM_PROVIDER",
        "HELPDESK_LLM_API_KEY",
        "HELPDESK_LLM_BASE_URL",
        "HELPDESK_LLM_MODEL",
        "HELPDESK_LLM_TIMEOUT_SECS",
        "HELPDESK_LLM_MAX_ATTEMPTS",
        "HELPDESK_LLM_RETRY_PAUSE_SECS",
        "HELPDESK_SERVER_BIND_ADDRESS",
        "HELPDESK_SERVER_API_PORT",
        "HELPDESK_SERVER_HEALTH_CHECK_PORT",
        "HELPDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "HELPDESK_LOGGING_LEVEL",
        "HELPDESK_LOGGING_FORMAT",
        "HELPDESK_LOG_LEVEL",
        "HELPDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
