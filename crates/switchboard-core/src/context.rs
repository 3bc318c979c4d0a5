//! Per-request conversation context with depth-limited windowing

use crate::providers::{ChatMessage, ChatRole};

/// Ordered message buffer for a single chat request.
///
/// Invariant: at most one system message, and if present it sits at
/// position 0. The context is built per request and discarded with it —
/// nothing here is shared or persisted.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    messages: Vec<ChatMessage>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end of the conversation.
    pub fn append(&mut self, role: ChatRole, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
    }

    /// Export the conversation, optionally windowed to the last `depth`
    /// non-system messages. The leading system message (if any) is always
    /// included. `None` or `Some(0)` exports the full sequence. Never
    /// mutates the context; the returned iterator is restartable via `Clone`.
    pub fn export(&self, depth: Option<usize>) -> impl Iterator<Item = &ChatMessage> + Clone {
        let system_len = usize::from(self.has_leading_system());
        let tail = &self.messages[system_len..];
        let keep = match depth {
            Some(d) if d > 0 => d.min(tail.len()),
            _ => tail.len(),
        };
        self.messages[..system_len]
            .iter()
            .chain(tail[tail.len() - keep..].iter())
    }

    /// Drop all messages, optionally keeping the leading system message.
    pub fn reset(&mut self, keep_system: bool) {
        if keep_system && self.has_leading_system() {
            self.messages.truncate(1);
        } else {
            self.messages.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn has_leading_system(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == ChatRole::System)
    }
}
