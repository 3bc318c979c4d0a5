//! DeepSeek provider — OpenAI-compatible chat completion
//!
//! Reuses the OpenAI wire codec with DeepSeek's base URL and a shorter
//! request timeout.

use std::time::Duration;

use async_trait::async_trait;

use super::openai::OpenAiProvider;
use super::types::{ChatMessage, ChatProvider};
use crate::error::ProviderError;

pub const DEEPSEEK_API_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";

const DEEPSEEK_TIMEOUT: Duration = Duration::from_secs(30);

/// DeepSeek client — wraps [`OpenAiProvider`] with a fixed endpoint
pub struct DeepSeekProvider {
    inner: OpenAiProvider,
}

impl std::fmt::Debug for DeepSeekProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSeekProvider")
            .field("inner", &self.inner)
            .finish()
    }
}

impl DeepSeekProvider {
    /// Create a DeepSeek client. Fails with
    /// [`ProviderError::InvalidCredential`] if the key is empty — before any
    /// network activity.
    pub fn new(api_key: &str, model: &str) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidCredential(
                "DeepSeek API key not found. Set it in the config or DEEPSEEK_API_KEY.".to_string(),
            ));
        }
        let inner = OpenAiProvider::with_endpoint(
            "deepseek",
            api_key,
            model,
            DEEPSEEK_API_URL,
            DEEPSEEK_TIMEOUT,
        )?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl ChatProvider for DeepSeekProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn send_request(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.inner.send_request(messages).await
    }
}
