//! # EduBridge Agent
//!
//! The orchestrator: validates a request, binds memory, assembles the tool
//! catalog (local plus remote, with a single local-only fallback), and runs
//! the model's tool-calling turn.

pub mod loop_runner;
pub mod orchestrator;
pub mod prompt;
pub mod setup;

pub use loop_runner::TurnRunner;
pub use orchestrator::{
    Orchestration, OrchestrationError, OrchestrationRequest, OrchestrationResponse, Orchestrator,
};
pub use setup::orchestrator_from_config;
