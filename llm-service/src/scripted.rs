//! Scripted in-memory LLM used by tests and dry runs.
//!
//! Replies are queued in advance; each `complete` call pops the next entry.
//! An optional per-call delay makes the client hold the caller mid-request,
//! which is how cancellation-during-LLM-call behavior gets exercised.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::Mutex;

use crate::errors::LlmError;

/// Queue-driven fake completion backend. Cloning shares the script and the
/// call counter.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLlm {
    replies: Arc<Mutex<VecDeque<Result<String, LlmError>>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `complete` call sleep before consuming its reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a successful reply.
    pub async fn push_text(&self, text: impl Into<String>) {
        self.replies.lock().await.push_back(Ok(text.into()));
    }

    /// Queues a failure.
    pub async fn push_error(&self, error: LlmError) {
        self.replies.lock().await.push_back(Err(error));
    }

    /// Number of `complete` calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Pops the next scripted reply; an exhausted script reports
    /// [`LlmError::EmptyCompletion`].
    pub async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyCompletion))
    }
}
