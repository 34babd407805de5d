//! Conversational assistant sessions.
//!
//! Each deployment keeps one history per session id, persisted as a JSON
//! array of role-tagged messages. Reference material (blueprints, documents,
//! course files) is matched by keyword and injected into the user turn
//! before the conversation reaches the gateway.

mod memory;
mod reference;
mod session;

pub use memory::{ChatStore, FileChatStore};
pub use reference::{ReferenceLibrary, ReferenceMatch};
pub use session::{ChatConfig, ChatSession, SessionManager};
