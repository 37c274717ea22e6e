//! # EduBridge Core
//!
//! Domain types, traits, and error definitions for the EduBridge
//! educational assistant orchestrator. This crate has **zero framework
//! dependencies**: it defines the domain model that all other crates
//! implement against.
//!
//! Every external collaborator (model, messaging transport, memory store,
//! tool sets) is a trait here. Implementations live in their respective
//! crates, which keeps tests on mocks and the dependency graph pointing
//! inward.

pub mod error;
pub mod message;
pub mod provider;
pub mod channel;
pub mod tool;
pub mod memory;
pub mod persona;
pub mod session;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role, Conversation};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use channel::{Channel, DeliveryReceipt, InboundMessage, MessageKind};
pub use tool::{CapabilitySet, Tool, ToolCall, ToolCatalog, ToolRegistry, ToolResult};
pub use memory::{MemoryBackend, MemoryRecord, RetrievalConfig};
pub use persona::{Persona, PersonaContext};
pub use session::SessionHandle;
pub use event::{DomainEvent, EventBus, OrchestrationStage};
