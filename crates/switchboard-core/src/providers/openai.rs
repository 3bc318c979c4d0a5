//! OpenAI provider — direct chat completion
//!
//! Also carries the OpenAI-compatible wire codec reused by providers that
//! speak the same format against a different base URL (see `deepseek.rs`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::{ChatMessage, ChatProvider};
use crate::error::ProviderError;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

const OPENAI_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI chat-completions client
pub struct OpenAiProvider {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a client against the OpenAI API. Fails with
    /// [`ProviderError::InvalidCredential`] if the key is empty — before any
    /// network activity.
    pub fn new(api_key: &str, model: &str) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidCredential(
                "OpenAI API key not found. Set it in the config or OPENAI_API_KEY.".to_string(),
            ));
        }
        Self::with_endpoint("openai", api_key, model, OPENAI_API_URL, OPENAI_TIMEOUT)
    }

    /// Create a client against any OpenAI-compatible endpoint. Credential
    /// presence must be validated by the caller with its own message.
    pub(crate) fn with_endpoint(
        name: &str,
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            name: name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// The message list passes through unmodified, system message first —
    /// the upstream API accepts system-first lists.
    fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let wire_messages = Self::to_wire_messages(messages);

        info!(
            "{}: sending request to {} with {} messages",
            self.name,
            self.model,
            wire_messages.len()
        );
        debug!("{}: messages: {:?}", self.name, wire_messages);

        let body = CompletionRequest {
            model: &self.model,
            messages: &wire_messages,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(&self.name, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(ProviderError::InvalidCredential(format!(
                    "{} authentication error: {detail}",
                    self.name
                )));
            }
            return Err(ProviderError::UpstreamResponse {
                status: status.as_u16(),
                message: detail,
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            ProviderError::UpstreamResponse {
                status: status.as_u16(),
                message: format!("failed to decode {} response: {e}", self.name),
            }
        })?;

        match parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
        {
            Some(text) => {
                info!("{}: received assistant reply", self.name);
                Ok(text)
            }
            None => Err(ProviderError::UpstreamResponse {
                status: 0,
                message: format!("unexpected or empty response structure from {}", self.name),
            }),
        }
    }
}

// ── OpenAI-compatible wire types ──

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected_at_construction() {
        let err = OpenAiProvider::new("", DEFAULT_OPENAI_MODEL).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredential(_)));
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn test_whitespace_key_rejected_at_construction() {
        let err = OpenAiProvider::new("   ", DEFAULT_OPENAI_MODEL).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredential(_)));
    }

    #[test]
    fn test_wire_messages_pass_through() {
        let messages = vec![
            ChatMessage::system("S"),
            ChatMessage::user("U"),
            ChatMessage::assistant("A"),
        ];
        let wire = OpenAiProvider::to_wire_messages(&messages);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[0].content, "S");
        assert_eq!(wire[1].role, "user");
        assert_eq!(wire[2].role, "assistant");
    }

    #[test]
    fn test_model_and_name() {
        let provider = OpenAiProvider::new("sk-test", "gpt-4o").unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model(), "gpt-4o");
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = OpenAiProvider::new("sk-secret-key", DEFAULT_OPENAI_MODEL).unwrap();
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret-key"));
    }

    #[test]
    fn test_response_decoding() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_response_decoding_null_content() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
