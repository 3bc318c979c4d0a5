//! Process-wide configuration
//!
//! Loaded once at startup and treated as immutable for the process lifetime;
//! client construction receives it explicitly rather than reading globals.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::providers::{deepseek, gemini, ollama, openai};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub providers: ProvidersSettings,
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
    #[serde(default)]
    pub gateway: GatewaySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            providers: ProvidersSettings::default(),
            default_system_prompt: default_system_prompt(),
            gateway: GatewaySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersSettings {
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub deepseek: DeepSeekSettings,
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub ollama: OllamaSettings,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .finish()
    }
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DeepSeekSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_deepseek_model")]
    pub model: String,
}

impl std::fmt::Debug for DeepSeekSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSeekSettings")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .finish()
    }
}

impl Default for DeepSeekSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_deepseek_model(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .finish()
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_openai_model() -> String {
    openai::DEFAULT_OPENAI_MODEL.to_string()
}

fn default_deepseek_model() -> String {
    deepseek::DEFAULT_DEEPSEEK_MODEL.to_string()
}

fn default_gemini_model() -> String {
    gemini::DEFAULT_GEMINI_MODEL.to_string()
}

fn default_ollama_url() -> String {
    ollama::DEFAULT_OLLAMA_URL.to_string()
}

fn default_ollama_model() -> String {
    ollama::DEFAULT_OLLAMA_MODEL.to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchboard")
}

impl Settings {
    /// Load settings from a TOML file, expanding `${ENV_VAR}` placeholders
    /// against the allowlist. Missing file falls back to defaults with env
    /// credentials applied.
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        if !path.exists() {
            warn!(
                "No config found at {}, using defaults with environment credentials",
                path.display()
            );
            let defaults = "\
                [providers.openai]\napi_key = \"${OPENAI_API_KEY}\"\n\
                [providers.deepseek]\napi_key = \"${DEEPSEEK_API_KEY}\"\n\
                [providers.gemini]\napi_key = \"${GEMINI_API_KEY}\"\n";
            let expanded = expand_env_vars(defaults);
            let mut settings: Self = toml::from_str(&expanded)?;
            if let Ok(url) = std::env::var("OLLAMA_API_URL")
                && !url.is_empty()
            {
                settings.providers.ollama.base_url = url;
            }
            return Ok(settings);
        }

        // The config may hold credentials; refuse one the group or world can read
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let expanded = expand_env_vars(&content);
        let settings: Self = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        if settings.providers.openai.api_key.starts_with("sk-") {
            warn!(
                "API key is hardcoded in config file. For security, use environment variables: api_key = \"${{OPENAI_API_KEY}}\""
            );
        }

        Ok(settings)
    }
}

/// Allowlist of environment variable names that may be expanded in config
/// files. Prevents a writable config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "DEEPSEEK_API_KEY",
    "GEMINI_API_KEY",
    "OLLAMA_API_URL",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        if let Some(start) = result[pos..].find("${") {
            let abs_start = pos + start;
            if let Some(end) = result[abs_start..].find('}') {
                let var_name = result[abs_start + 2..abs_start + end].to_string();

                let value = if ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
                    std::env::var(&var_name).unwrap_or_default()
                } else {
                    warn!(
                        "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                        var_name
                    );
                    pos = abs_start + end + 1;
                    continue;
                };

                let value_len = value.len();
                result = format!(
                    "{}{}{}",
                    &result[..abs_start],
                    value,
                    &result[abs_start + end + 1..]
                );
                pos = abs_start + value_len;
            } else {
                break;
            }
        } else {
            break;
        }
    }
    result
}
