//! Conversation turn orchestration for the helpdesk runtime.
//!
//! This crate is the decision core of the system: for one incoming customer
//! query it classifies intent, picks between tool dispatch and model
//! generation, applies the escalation policy, and persists the turn as an
//! ordered user/assistant pair.
//!
//! # Architecture
//!
//! A turn flows through a fixed pipeline:
//! 1. **Classification** (`gateway`) - one deterministic model call maps the
//!    query to an `Intent`
//! 2. **Branching** (`orchestrator`) - escalation text, tool dispatch
//!    (`tools`), or history-aware generation (`gateway` + `history`)
//! 3. **Policy** (`escalation`) - explicit-request and confidence-threshold
//!    checks, monotonic within the turn
//! 4. **Persistence** - two messages, a conversation update, and at most one
//!    escalation record via the `ConversationLog` seam
//!
//! # Degradation principle
//!
//! Model failures never abort a turn. Transient upstream trouble is retried
//! a bounded number of times (`retry`), then collapses to a fixed apology.
//! The caller always gets a well-formed outcome; only an unknown agent or a
//! failure before the first write aborts.

pub mod escalation;
pub mod gateway;
pub mod history;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod tools;

pub use gateway::{LanguageModelGateway, APOLOGY};
pub use llm::{ChatRole, ChatTurn, GenerationConfig, LlmClient, LlmError};
pub use orchestrator::{ConversationOrchestrator, TurnOutcome, TurnRequest, TURN_CONFIDENCE};
