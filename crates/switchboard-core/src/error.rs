//! Normalized error taxonomy shared by all provider clients
//!
//! Every upstream failure — whatever the provider's native vocabulary — is
//! collapsed into one of these categories at the client boundary. The gateway
//! maps categories to external HTTP status codes in exactly one place
//! ([`ProviderError::http_status`]); nothing downstream re-interprets them.

use thiserror::Error;

/// Categorized failure produced by every provider client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Missing, rejected, or expired credential, or permission denied upstream.
    #[error("invalid or missing API credential: {0}")]
    InvalidCredential(String),

    /// Network unreachable, DNS failure, or timeout.
    #[error("provider connection error: {0}")]
    Connection(String),

    /// Upstream was reachable but returned an error status or an unexpected
    /// payload. `status` is the upstream code, or 0 where the provider has no
    /// status concept (e.g. a safety-filtered empty generation).
    #[error("provider API error {status}: {message}")]
    UpstreamResponse { status: u16, message: String },

    /// Anything unanticipated at the client boundary.
    #[error("internal client error: {0}")]
    Internal(String),

    /// The caller-supplied request is structurally invalid (unknown provider
    /// tag, no user message after windowing, bad client configuration).
    #[error("invalid request: {0}")]
    RequestValidation(String),
}

impl ProviderError {
    /// External HTTP status for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidCredential(_) => 401,
            Self::RequestValidation(_) => 400,
            Self::UpstreamResponse { status, .. } => match status {
                404 => 404,
                429 => 429,
                400..=499 => 400,
                _ => 500,
            },
            Self::Connection(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Classify a reqwest transport failure from `send()`.
    ///
    /// Timeouts, connect errors, and request-level failures are connection
    /// errors; anything else (builder misuse, redirect loops) is internal.
    pub(crate) fn transport(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Connection(format!("{provider}: {err}"))
        } else {
            Self::Internal(format!("{provider}: {err}"))
        }
    }
}
