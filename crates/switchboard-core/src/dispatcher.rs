//! Gateway dispatcher — resolves a provider tag, builds the conversation
//! context, and maps the single upstream call to the external contract

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::ConversationContext;
use crate::error::ProviderError;
use crate::providers::{
    ChatMessage, ChatProvider, ChatRole, DeepSeekProvider, GeminiProvider, OllamaProvider,
    OpenAiProvider,
};
use crate::settings::Settings;

/// The closed set of provider tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    OpenAi,
    DeepSeek,
    Gemini,
    Ollama,
}

impl ClientType {
    /// Resolve a requested tag, case-insensitively and ignoring surrounding
    /// whitespace.
    pub fn parse(tag: &str) -> Result<Self, ProviderError> {
        match tag.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "deepseek" => Ok(Self::DeepSeek),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(ProviderError::RequestValidation(format!(
                "unknown client type: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound chat request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Provider tag selecting the upstream service
    pub client_type: String,
    /// Ordered conversation turns
    pub messages: Vec<ChatMessage>,
    /// Model override, honored by Gemini and Ollama
    #[serde(default)]
    pub model_name_override: Option<String>,
    /// Replaces any system message found in `messages`
    #[serde(default)]
    pub system_prompt_override: Option<String>,
    /// Window depth; 0 or absent means the full conversation
    #[serde(default)]
    pub context_depth: Option<usize>,
}

/// Outbound chat reply.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub assistant_response: String,
    pub client_used: String,
    pub model_used: Option<String>,
}

/// Handle one chat request end to end: resolve, construct, build context,
/// window, validate, dispatch, and assemble the reply. Every failure is a
/// [`ProviderError`]; the serving layer owns the HTTP translation.
pub async fn handle_chat(
    settings: &Settings,
    request: &ChatRequest,
) -> Result<ChatReply, ProviderError> {
    info!("dispatcher: request for client {}", request.client_type);
    debug!("dispatcher: request: {:?}", request);

    let client_type = ClientType::parse(&request.client_type)?;
    let client = build_client(settings, client_type, request.model_name_override.as_deref())?;
    run_chat(
        client_type,
        client.as_ref(),
        request,
        &settings.default_system_prompt,
    )
    .await
}

/// Construct the provider client for a resolved tag.
///
/// A missing credential surfaces as `InvalidCredential`; any other
/// construction failure is reported as a client-configuration problem, which
/// the external contract treats as a caller error.
fn build_client(
    settings: &Settings,
    client_type: ClientType,
    model_override: Option<&str>,
) -> Result<Box<dyn ChatProvider>, ProviderError> {
    let providers = &settings.providers;
    let built: Result<Box<dyn ChatProvider>, ProviderError> = match client_type {
        ClientType::OpenAi => OpenAiProvider::new(&providers.openai.api_key, &providers.openai.model)
            .map(|p| Box::new(p) as Box<dyn ChatProvider>),
        ClientType::DeepSeek => {
            DeepSeekProvider::new(&providers.deepseek.api_key, &providers.deepseek.model)
                .map(|p| Box::new(p) as Box<dyn ChatProvider>)
        }
        ClientType::Gemini => {
            let model = model_override.unwrap_or(&providers.gemini.model);
            GeminiProvider::new(&providers.gemini.api_key, model)
                .map(|p| Box::new(p) as Box<dyn ChatProvider>)
        }
        ClientType::Ollama => {
            let model = model_override.unwrap_or(&providers.ollama.model);
            OllamaProvider::new(&providers.ollama.base_url, model)
                .map(|p| Box::new(p) as Box<dyn ChatProvider>)
        }
    };

    built.map_err(|e| match e {
        ProviderError::InvalidCredential(_) => {
            warn!("dispatcher: credential error constructing {client_type} client: {e}");
            e
        }
        other => {
            warn!("dispatcher: failed to construct {client_type} client: {other}");
            ProviderError::RequestValidation(format!("client configuration error: {other}"))
        }
    })
}

/// Determine the effective system instruction and the non-system turns.
///
/// Precedence: explicit request override (body system messages are
/// discarded) → first system message in the body (later ones are ignored) →
/// the process-wide default.
fn build_context(request: &ChatRequest, default_system_prompt: &str) -> ConversationContext {
    let mut system_prompt: Option<&str> = request.system_prompt_override.as_deref();

    if system_prompt.is_none() {
        for message in &request.messages {
            if message.role == ChatRole::System {
                if system_prompt.is_none() {
                    system_prompt = Some(&message.content);
                } else {
                    warn!("dispatcher: multiple system messages in request, using the first");
                }
            }
        }
    }
    let system_prompt = system_prompt.unwrap_or(default_system_prompt);

    let mut context = ConversationContext::new();
    if system_prompt.trim().is_empty() {
        info!("dispatcher: no system instruction in effect");
    } else {
        context.append(ChatRole::System, system_prompt);
        debug!("dispatcher: system instruction in effect: {system_prompt:?}");
    }
    for message in &request.messages {
        if message.role != ChatRole::System {
            context.append(message.role, message.content.clone());
        }
    }
    context
}

async fn run_chat(
    client_type: ClientType,
    client: &dyn ChatProvider,
    request: &ChatRequest,
    default_system_prompt: &str,
) -> Result<ChatReply, ProviderError> {
    let context = build_context(request, default_system_prompt);
    let window: Vec<ChatMessage> = context.export(request.context_depth).cloned().collect();

    if !window.iter().any(|m| m.role == ChatRole::User) {
        return Err(ProviderError::RequestValidation(
            "request must contain at least one user message".to_string(),
        ));
    }

    info!(
        "dispatcher: dispatching {} messages to {} ({})",
        window.len(),
        client_type,
        client.model()
    );
    let assistant_response = client.send_request(&window).await?;
    info!("dispatcher: assistant reply received from {client_type}");

    Ok(ChatReply {
        assistant_response,
        client_used: client_type.to_string(),
        model_used: Some(client.model().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mock provider that records what it was sent
    struct RecordingProvider {
        reply: String,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl RecordingProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for RecordingProvider {
        fn provider_name(&self) -> &str {
            "mock"
        }
        fn model(&self) -> &str {
            "mock-model"
        }
        async fn send_request(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
            *self.seen.lock().unwrap() = messages.to_vec();
            Ok(self.reply.clone())
        }
    }

    /// Mock provider that always fails with a fixed error
    struct FailingProvider {
        error: ProviderError,
    }

    #[async_trait]
    impl ChatProvider for FailingProvider {
        fn provider_name(&self) -> &str {
            "mock"
        }
        fn model(&self) -> &str {
            "mock-model"
        }
        async fn send_request(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            Err(self.error.clone())
        }
    }

    fn request(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            client_type: "openai".to_string(),
            messages,
            model_name_override: None,
            system_prompt_override: None,
            context_depth: None,
        }
    }

    #[test]
    fn test_parse_tag_case_insensitive_and_trimmed() {
        assert_eq!(ClientType::parse("OpenAI").unwrap(), ClientType::OpenAi);
        assert_eq!(ClientType::parse("  gemini  ").unwrap(), ClientType::Gemini);
        assert_eq!(ClientType::parse("OLLAMA").unwrap(), ClientType::Ollama);
        assert_eq!(ClientType::parse("DeepSeek").unwrap(), ClientType::DeepSeek);
    }

    #[test]
    fn test_parse_unknown_tag() {
        let err = ClientType::parse("mistral").unwrap_err();
        assert!(matches!(err, ProviderError::RequestValidation(_)));
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_override_wins_and_drops_body_system() {
        let mut req = request(vec![ChatMessage::system("body"), ChatMessage::user("hi")]);
        req.system_prompt_override = Some("override".to_string());

        let context = build_context(&req, "default");
        let exported: Vec<_> = context.export(None).collect();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].role, ChatRole::System);
        assert_eq!(exported[0].content, "override");
        assert_eq!(exported[1].content, "hi");
    }

    #[test]
    fn test_first_body_system_wins_over_later_ones() {
        let req = request(vec![
            ChatMessage::system("first"),
            ChatMessage::user("hi"),
            ChatMessage::system("second"),
        ]);
        let context = build_context(&req, "default");
        let exported: Vec<_> = context.export(None).collect();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].content, "first");
        assert_eq!(exported[1].content, "hi");
    }

    #[test]
    fn test_default_system_prompt_fallback() {
        let req = request(vec![ChatMessage::user("hi")]);
        let context = build_context(&req, "default");
        let exported: Vec<_> = context.export(None).collect();
        assert_eq!(exported[0].role, ChatRole::System);
        assert_eq!(exported[0].content, "default");
    }

    #[test]
    fn test_blank_system_prompt_omitted() {
        let mut req = request(vec![ChatMessage::user("hi")]);
        req.system_prompt_override = Some("   ".to_string());
        let context = build_context(&req, "default");
        let exported: Vec<_> = context.export(None).collect();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].role, ChatRole::User);
    }

    #[tokio::test]
    async fn test_system_only_request_rejected_before_dispatch() {
        let provider = RecordingProvider::new("unreached");
        let req = request(vec![ChatMessage::system("S")]);
        let err = run_chat(ClientType::OpenAi, &provider, &req, "default")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RequestValidation(_)));
        assert_eq!(err.http_status(), 400);
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_dispatch_builds_reply() {
        let provider = RecordingProvider::new("42");
        let req = request(vec![ChatMessage::user("what is the answer?")]);
        let reply = run_chat(ClientType::Gemini, &provider, &req, "default")
            .await
            .unwrap();
        assert_eq!(reply.assistant_response, "42");
        assert_eq!(reply.client_used, "gemini");
        assert_eq!(reply.model_used.as_deref(), Some("mock-model"));

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, ChatRole::System);
        assert_eq!(seen[1].content, "what is the answer?");
    }

    #[tokio::test]
    async fn test_windowing_applied_before_dispatch() {
        let provider = RecordingProvider::new("ok");
        let mut req = request(vec![
            ChatMessage::user("old-1"),
            ChatMessage::assistant("old-2"),
            ChatMessage::user("recent"),
        ]);
        req.context_depth = Some(1);
        run_chat(ClientType::OpenAi, &provider, &req, "default")
            .await
            .unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, ChatRole::System);
        assert_eq!(seen[1].content, "recent");
    }

    #[tokio::test]
    async fn test_window_without_user_message_rejected() {
        // Depth 1 keeps only the trailing assistant turn
        let provider = RecordingProvider::new("unreached");
        let mut req = request(vec![
            ChatMessage::user("question"),
            ChatMessage::assistant("answer"),
        ]);
        req.context_depth = Some(1);
        let err = run_chat(ClientType::OpenAi, &provider, &req, "default")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RequestValidation(_)));
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_passes_through_unchanged() {
        let provider = FailingProvider {
            error: ProviderError::UpstreamResponse {
                status: 429,
                message: "rate limited".to_string(),
            },
        };
        let req = request(vec![ChatMessage::user("hi")]);
        let err = run_chat(ClientType::OpenAi, &provider, &req, "default")
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 429);

        let provider = FailingProvider {
            error: ProviderError::Connection("timed out".to_string()),
        };
        let err = run_chat(ClientType::OpenAi, &provider, &req, "default")
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 503);
    }

    #[tokio::test]
    async fn test_handle_chat_missing_credential_no_network() {
        // Settings with no keys: construction must fail with
        // InvalidCredential before any outbound activity.
        let settings = Settings::default();
        let req = request(vec![ChatMessage::user("hi")]);
        let err = handle_chat(&settings, &req).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredential(_)));
        assert_eq!(err.http_status(), 401);
    }

    #[tokio::test]
    async fn test_handle_chat_unknown_tag() {
        let settings = Settings::default();
        let mut req = request(vec![ChatMessage::user("hi")]);
        req.client_type = "mistral".to_string();
        let err = handle_chat(&settings, &req).await.unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_model_override_reaches_gemini_and_ollama() {
        let mut settings = Settings::default();
        settings.providers.gemini.api_key = "AIza-test".to_string();

        let client =
            build_client(&settings, ClientType::Gemini, Some("gemini-exp")).unwrap();
        assert_eq!(client.model(), "gemini-exp");

        let client = build_client(&settings, ClientType::Ollama, Some("llama3")).unwrap();
        assert_eq!(client.model(), "llama3");
    }

    #[test]
    fn test_model_override_ignored_for_direct_providers() {
        let mut settings = Settings::default();
        settings.providers.openai.api_key = "sk-test".to_string();

        let client = build_client(&settings, ClientType::OpenAi, Some("gpt-4o")).unwrap();
        assert_eq!(client.model(), settings.providers.openai.model);
    }
}
