//! Provider-agnostic message types and the client capability trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single role-tagged conversation turn. Immutable once created; ordering
/// within a conversation is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Trait that all provider clients implement.
///
/// One capability: send an ordered list of role-tagged messages, receive the
/// assistant's text. Implementations never mutate the slice handed to them;
/// each applies its own provider-specific preprocessing before the wire call.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider tag (e.g. "openai", "gemini")
    fn provider_name(&self) -> &str;

    /// Resolved model identifier for this instance
    fn model(&self) -> &str;

    /// Send the conversation upstream and return the assistant's reply text.
    async fn send_request(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}
