use review_engine::ReviewEngine;

/// Shared state for all HTTP handlers.
pub struct AppState {
    /// The engine running reviews behind the webhook. It owns the config
    /// snapshot, the idempotency ledger, and the worker pool.
    pub engine: ReviewEngine,
}

impl AppState {
    pub fn new(engine: ReviewEngine) -> Self {
        Self { engine }
    }
}
