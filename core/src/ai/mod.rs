//! AI decision gateway and chat-completion backends.
//!
//! The gateway is the single seam between business logic and the model
//! service. It isolates callers from connectivity failures and performs no
//! retries: one attempt per call, fail fast, let the caller take its
//! deterministic fallback branch.

mod backend;
mod gateway;

pub use backend::{
    AiConfig, BackendKind, ChatBackend, ChatMessage, ChatRole, HostedModelClient, LocalModelClient,
};
pub use gateway::{AiGateway, DecisionGateway, GatewayError};
