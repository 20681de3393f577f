//! OpenAI-compatible chat-completions client.
//!
//! Minimal, non-streaming client used for review generation:
//! - POST {endpoint}/v1/chat/completions
//!
//! Constructor validation:
//! - `cfg.endpoint` must start with http:// or https://
//! - `cfg.api_key` must be non-empty
//! - parameter ranges checked by [`LlmConfig::validate`]
//!
//! Errors are normalized into [`LlmError`].

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{config::LlmConfig, errors::LlmError};

/// Thin client for one OpenAI-compatible endpoint.
///
/// Constructed from a complete [`LlmConfig`]. Internally keeps a
/// preconfigured `reqwest::Client` (timeout and default headers) and the
/// resolved chat URL.
#[derive(Debug)]
pub struct ChatCompletionsService {
    client: reqwest::Client,
    cfg: LlmConfig,
    url_chat: String,
}

impl ChatCompletionsService {
    /// Creates a new service from the given config.
    ///
    /// # Errors
    /// - [`LlmError::InvalidEndpoint`] / [`LlmError::MissingApiKey`] /
    ///   [`LlmError::InvalidParameter`] from config validation
    /// - [`LlmError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmConfig) -> Result<Self, LlmError> {
        cfg.validate()?;

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))
            .map_err(|e| LlmError::Decode(format!("invalid API key header: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .user_agent("review-gate/0.1")
            .build()?;

        let base = cfg.endpoint.trim().trim_end_matches('/').to_string();
        let url_chat = format!("{}/v1/chat/completions", base);

        info!(
            model = %cfg.model,
            endpoint = %base,
            timeout_secs = cfg.timeout_secs,
            "ChatCompletionsService initialized"
        );

        Ok(Self { client, cfg, url_chat })
    }

    /// Runs a single non-streaming completion and returns the reply text.
    ///
    /// `max_tokens` caps the completion side only; prompt budgeting is the
    /// caller's concern.
    ///
    /// # Errors
    /// - [`LlmError::Timeout`] on transport deadline
    /// - [`LlmError::RateLimited`] / [`LlmError::Server`] /
    ///   [`LlmError::HttpStatus`] on non-success statuses
    /// - [`LlmError::Decode`] on unexpected response shape
    /// - [`LlmError::EmptyCompletion`] when no choice carries text
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: self.cfg.temperature,
            stream: false,
        };

        let started = Instant::now();
        let resp = self
            .client
            .post(&self.url_chat)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: ChatCompletionResponse = resp.json().await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.and_then(|m| m.content))
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)?;

        debug!(
            model = %self.cfg.model,
            latency_ms,
            reply_chars = text.chars().count(),
            "chat completion ok"
        );

        Ok(text)
    }

    /// Model identifier this client is bound to.
    pub fn model(&self) -> &str {
        &self.cfg.model
    }
}

/* ==========================
HTTP payloads (subset of the OpenAI schema we actually use)
========================== */

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
