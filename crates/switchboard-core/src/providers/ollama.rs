//! Ollama provider — flattened-prompt generation
//!
//! Ollama's `/api/generate` takes a single prompt string plus an optional
//! side-channel system field, so the conversation is rendered as
//! `"Role: content"` lines. No credential is required, only a base URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::types::{ChatMessage, ChatProvider, ChatRole};
use crate::error::ProviderError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";

const OLLAMA_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama client
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl OllamaProvider {
    /// Create an Ollama client against `base_url`. Needs no credential.
    pub fn new(base_url: &str, model: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(OLLAMA_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    /// Pull the leading system message off into the side channel and render
    /// the rest as `"Role: content"` lines. An empty prompt with a system
    /// instruction present gets a literal greeting so the upstream call is
    /// never empty.
    fn flatten_prompt(messages: &[ChatMessage]) -> (Option<String>, String) {
        let mut remaining = messages;
        let mut system = None;
        if let Some((first, rest)) = remaining.split_first()
            && first.role == ChatRole::System
        {
            system = Some(first.content.clone());
            remaining = rest;
        }

        let prompt = remaining
            .iter()
            .map(|m| format!("{}: {}", capitalize_role(m.role), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        if prompt.is_empty() && system.is_some() {
            warn!("ollama: conversation is empty apart from the system instruction");
            return (system, "Hello".to_string());
        }
        (system, prompt)
    }
}

fn capitalize_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "System",
        ChatRole::User => "User",
        ChatRole::Assistant => "Assistant",
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let (system, prompt) = Self::flatten_prompt(messages);

        info!(
            "ollama: sending request to {} ({}) with {} messages",
            self.model,
            self.endpoint,
            messages.len()
        );

        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            system: system.as_deref(),
        };
        debug!("ollama: payload: {:?}", body);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport("ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::UpstreamResponse {
                status: status.as_u16(),
                message: detail,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ProviderError::UpstreamResponse {
                status: status.as_u16(),
                message: format!("failed to decode Ollama response: {e}"),
            }
        })?;

        if let Some(text) = parsed.response.filter(|t| !t.is_empty()) {
            info!("ollama: received assistant reply");
            return Ok(text.trim().to_string());
        }
        if let Some(error) = parsed.error {
            return Err(ProviderError::UpstreamResponse {
                status: status.as_u16(),
                message: format!("Ollama API error: {error}"),
            });
        }
        Err(ProviderError::UpstreamResponse {
            status: 0,
            message: "unexpected or empty response structure from Ollama".to_string(),
        })
    }
}

// ── Ollama wire types ──

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_no_credential() {
        let provider = OllamaProvider::new(DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL);
        assert!(provider.is_ok());
    }

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let provider = OllamaProvider::new("http://localhost:11434/", "llama3").unwrap();
        assert_eq!(provider.endpoint, "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_flatten_renders_role_lines() {
        let messages = vec![
            ChatMessage::system("S"),
            ChatMessage::user("U1"),
            ChatMessage::assistant("A1"),
        ];
        let (system, prompt) = OllamaProvider::flatten_prompt(&messages);
        assert_eq!(system.as_deref(), Some("S"));
        assert_eq!(prompt, "User: U1\nAssistant: A1");
    }

    #[test]
    fn test_flatten_without_system() {
        let messages = vec![ChatMessage::user("hi")];
        let (system, prompt) = OllamaProvider::flatten_prompt(&messages);
        assert!(system.is_none());
        assert_eq!(prompt, "User: hi");
    }

    #[test]
    fn test_flatten_system_only_falls_back_to_greeting() {
        let messages = vec![ChatMessage::system("S")];
        let (system, prompt) = OllamaProvider::flatten_prompt(&messages);
        assert_eq!(system.as_deref(), Some("S"));
        assert_eq!(prompt, "Hello");
    }

    #[test]
    fn test_flatten_empty_without_system_stays_empty() {
        let (system, prompt) = OllamaProvider::flatten_prompt(&[]);
        assert!(system.is_none());
        assert_eq!(prompt, "");
    }

    #[test]
    fn test_request_skips_absent_system_field() {
        let body = GenerateRequest {
            model: "llama3",
            prompt: "User: hi",
            stream: false,
            system: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("system"));

        let body = GenerateRequest {
            system: Some("S"),
            ..body
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"system\":\"S\""));
    }

    #[test]
    fn test_response_decoding_error_payload() {
        let json = r#"{"error":"model not loaded"}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.response.is_none());
        assert_eq!(parsed.error.as_deref(), Some("model not loaded"));
    }
}
