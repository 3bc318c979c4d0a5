//! switchboard-core — provider abstraction and normalization layer
//!
//! This crate provides:
//! - Provider clients for OpenAI, DeepSeek, Google Gemini, and Ollama behind
//!   one capability trait
//! - A per-request conversation context with depth-limited windowing
//! - A normalized error taxonomy with a single external status mapping
//! - The gateway dispatcher tying request → context → provider → reply
//! - Process-wide settings loaded once and passed explicitly

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod providers;
pub mod settings;

// Re-export main types for convenience
pub use context::ConversationContext;
pub use dispatcher::{ChatReply, ChatRequest, ClientType, handle_chat};
pub use error::ProviderError;
pub use providers::{ChatMessage, ChatProvider, ChatRole};
pub use settings::Settings;
