//! Shared LLM service: one OpenAI-compatible chat client plus a scripted
//! fake, unified errors, and enum dispatch.
//!
//! The crate intentionally exposes a single capability to callers:
//!
//! ```text
//! complete(prompt, max_tokens) -> text | timeout | error
//! ```
//!
//! Dispatch is enum-based; no `async-trait`, no `Box<dyn ...>`.

pub mod chat;
pub mod config;
pub mod errors;
pub mod scripted;

pub use chat::ChatCompletionsService;
pub use config::LlmConfig;
pub use errors::LlmError;
pub use scripted::ScriptedLlm;

/// Completion backend selected at wiring time.
#[derive(Debug)]
pub enum LlmClient {
    /// Real OpenAI-compatible endpoint.
    Chat(ChatCompletionsService),
    /// Queue-driven fake for tests and dry runs.
    Scripted(ScriptedLlm),
}

impl LlmClient {
    /// Runs one completion against the selected backend.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        match self {
            LlmClient::Chat(svc) => svc.complete(prompt, max_tokens).await,
            LlmClient::Scripted(fake) => fake.complete(prompt, max_tokens).await,
        }
    }
}
