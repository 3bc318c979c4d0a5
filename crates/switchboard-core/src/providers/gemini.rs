//! Google Gemini provider — generative content with role remapping
//!
//! Gemini has no system role and no assistant role: the system instruction is
//! folded into the first user turn, assistant turns become "model", and the
//! contents list must end with a user turn.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::types::{ChatMessage, ChatProvider, ChatRole};
use crate::error::ProviderError;

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const GEMINI_TIMEOUT: Duration = Duration::from_secs(60);

/// Upstream error-code fragments that indicate a bad or blocked credential.
const CREDENTIAL_MARKERS: &[&str] = &[
    "API_KEY_INVALID",
    "API_KEY_EXPIRED",
    "API_KEY_BLOCKED",
    "PERMISSION_DENIED",
];

/// Upstream message fragments that indicate the model does not exist or is
/// not usable. Best-effort: these strings track the upstream error texts and
/// may drift across API versions.
const MODEL_NOT_FOUND_MARKERS: &[&str] = &[
    "is not found for API version",
    "could not be found",
    "Call ListModels",
];

/// Google Gemini client
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a Gemini client. Fails with
    /// [`ProviderError::InvalidCredential`] if the key is empty — before any
    /// network activity.
    pub fn new(api_key: &str, model: &str) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidCredential(
                "Gemini API key not found. Set it in the config or GEMINI_API_KEY.".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(GEMINI_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Fold the leading system message into the first user turn
    /// (newline-separated), remap assistant→"model", and guarantee a
    /// non-empty, user-terminated contents list.
    fn to_gemini_contents(messages: &[ChatMessage]) -> Vec<GeminiContent> {
        let mut remaining: Vec<ChatMessage> = messages.to_vec();
        let system = (remaining.first().map(|m| m.role) == Some(ChatRole::System))
            .then(|| remaining.remove(0).content);

        if let Some(system) = system {
            match remaining.first_mut() {
                Some(first) if first.role == ChatRole::User => {
                    first.content = format!("{system}\n\n{}", first.content);
                }
                Some(_) => remaining.insert(0, ChatMessage::user(system)),
                None => remaining.push(ChatMessage::user(system)),
            }
        }

        let mut contents: Vec<GeminiContent> = remaining
            .into_iter()
            .map(|m| GeminiContent {
                role: match m.role {
                    ChatRole::User => "user".to_string(),
                    _ => "model".to_string(),
                },
                parts: vec![GeminiPart { text: m.content }],
            })
            .collect();

        if contents.is_empty() {
            contents.push(GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: "Hello".to_string(),
                }],
            });
        } else if contents.last().map(|c| c.role.as_str()) != Some("user") {
            warn!("gemini: contents do not end with a user turn, appending a continuation");
            contents.push(GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: "Continue".to_string(),
                }],
            });
        }

        contents
    }

    /// Classify an upstream failure from its status (where one exists) and
    /// detail text. The model-not-found detection is substring matching on
    /// third-party error messages — best-effort, not a guaranteed signal;
    /// unmatched failures without a status fall through to `Internal`.
    fn classify_failure(status: Option<u16>, detail: &str) -> ProviderError {
        if matches!(status, Some(401) | Some(403))
            || CREDENTIAL_MARKERS.iter().any(|m| detail.contains(m))
        {
            return ProviderError::InvalidCredential(format!("Gemini API key error: {detail}"));
        }
        if MODEL_NOT_FOUND_MARKERS.iter().any(|m| detail.contains(m)) {
            return ProviderError::UpstreamResponse {
                status: 404,
                message: format!("model not found or not supported: {detail}"),
            };
        }
        match status {
            Some(status) => ProviderError::UpstreamResponse {
                status,
                message: detail.to_string(),
            },
            None => ProviderError::Internal(format!("unexpected Gemini error: {detail}")),
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let url = format!(
            "{GEMINI_API_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let contents = Self::to_gemini_contents(messages);

        info!(
            "gemini: sending request to {} with {} turns",
            self.model,
            contents.len()
        );
        debug!("gemini: contents: {:?}", contents);

        let body = GenerateRequest {
            contents: &contents,
            generation_config: GenerationConfig { candidate_count: 1 },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport("gemini", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Self::classify_failure(Some(status.as_u16()), &detail));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ProviderError::UpstreamResponse {
                status: status.as_u16(),
                message: format!("failed to decode Gemini response: {e}"),
            }
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if !text.is_empty() {
            info!("gemini: received assistant reply");
            return Ok(text);
        }

        // Parsed but empty: either a safety block or a malformed candidate
        // list. Never returned as empty text.
        if let Some(feedback) = parsed.prompt_feedback
            && let Some(reason) = feedback.block_reason
        {
            let message = match feedback.block_reason_message {
                Some(detail) => format!("request blocked: {reason}. {detail}"),
                None => format!("request blocked: {reason}"),
            };
            return Err(ProviderError::UpstreamResponse { status: 0, message });
        }
        Err(ProviderError::UpstreamResponse {
            status: 0,
            message: "unexpected or empty response from Gemini".to_string(),
        })
    }
}

// ── Gemini wire types ──

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [GeminiContent],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct GenerationConfig {
    #[serde(rename = "candidateCount")]
    candidate_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
    #[serde(rename = "blockReasonMessage")]
    block_reason_message: Option<String>,
}
