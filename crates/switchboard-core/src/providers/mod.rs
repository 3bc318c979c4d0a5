//! Multi-provider LLM client layer
//!
//! One capability — send an ordered list of role-tagged messages, receive
//! assistant text — implemented per upstream wire format: OpenAI and DeepSeek
//! (direct chat completion), Google Gemini (generative content with role
//! remapping), and Ollama (flattened prompt). Providers implement the
//! [`ChatProvider`] trait and normalize every upstream failure into
//! [`crate::error::ProviderError`] at their own boundary.

pub mod deepseek;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod types;

pub use deepseek::DeepSeekProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use types::{ChatMessage, ChatProvider, ChatRole};
