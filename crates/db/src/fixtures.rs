//! Deterministic demo fixtures for local development and smoke runs.

use helpdesk_core::domain::agent::AgentDraft;

use crate::repositories::{AgentDirectory, RepositoryError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub agents_created: usize,
    pub agents_existing: usize,
}

fn demo_agents() -> Vec<AgentDraft> {
    vec![
        AgentDraft {
            name: "Aria".to_string(),
            persona: "Warm, efficient order-support specialist.".to_string(),
            system_instructions: "You are Aria, a customer support agent for an online store. \
                                  Answer order questions concisely and offer next steps."
                .to_string(),
            tools: vec![
                "check_order_status".to_string(),
                "update_order_address".to_string(),
                "send_email".to_string(),
            ],
            escalation_threshold: 0.5,
        },
        AgentDraft {
            name: "Billing Bot".to_string(),
            persona: "Precise billing and refunds assistant.".to_string(),
            system_instructions: "You are a billing assistant. Explain charges plainly and \
                                  never promise refunds you cannot issue."
                .to_string(),
            tools: vec!["initiate_refund".to_string(), "apply_discount".to_string()],
            escalation_threshold: 0.7,
        },
    ]
}

/// Seed the demo agents. Idempotent: an active agent with the same name is
/// counted as existing and left untouched.
pub async fn seed_demo_agents(
    directory: &dyn AgentDirectory,
) -> Result<SeedResult, RepositoryError> {
    let existing = directory.list_active().await?;
    let mut result = SeedResult::default();

    for draft in demo_agents() {
        if existing.iter().any(|profile| profile.name == draft.name) {
            result.agents_existing += 1;
            continue;
        }
        directory.create(draft).await?;
        result.agents_created += 1;
    }

    Ok(result)
}
