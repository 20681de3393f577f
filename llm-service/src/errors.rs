//! Unified error type for the LLM service.
//!
//! Goals:
//! - One error enum for construction, transport, and decoding failures.
//! - A `is_transient()` predicate so callers can drive retry policies
//!   without matching on variants.
//! - Mapping from `reqwest::Error` that distinguishes timeout, HTTP status
//!   classes, decode failures, and plain transport errors.

use thiserror::Error;

/// All failures the LLM service can produce.
#[derive(Debug, Error)]
pub enum LlmError {
    /// API key is required for the configured endpoint but missing/empty.
    #[error("[LLM Service] Missing API key for endpoint {0}")]
    MissingApiKey(String),

    /// Endpoint is empty or does not use http/https.
    #[error("[LLM Service] Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A configuration value is out of its accepted range.
    #[error("[LLM Service] Invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    /// Transport-level timeout (connect or full request deadline).
    #[error("[LLM Service] Request timed out")]
    Timeout,

    /// Rate limited by the provider (HTTP 429).
    #[error("[LLM Service] Rate limited by provider")]
    RateLimited,

    /// Provider-side failure (HTTP 5xx).
    #[error("[LLM Service] Provider server error: status {0}")]
    Server(u16),

    /// Any other non-success HTTP status (auth failures land here too).
    #[error("[LLM Service] Unexpected http status: {0}")]
    HttpStatus(u16),

    /// Network failure without an HTTP status (DNS/connect/reset).
    #[error("[LLM Service] Transport error: {0}")]
    Transport(String),

    /// Response body did not decode into the expected shape.
    #[error("[LLM Service] Decode error: {0}")]
    Decode(String),

    /// Response decoded but contained no usable completion text.
    #[error("[LLM Service] Provider returned an empty completion")]
    EmptyCompletion,
}

impl LlmError {
    /// True for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout
                | LlmError::RateLimited
                | LlmError::Server(_)
                | LlmError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return LlmError::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                429 => LlmError::RateLimited,
                500..=599 => LlmError::Server(code),
                _ => LlmError::HttpStatus(code),
            };
        }
        if e.is_decode() {
            return LlmError::Decode(e.to_string());
        }
        LlmError::Transport(e.to_string())
    }
}
