use thiserror::Error;

/// Boot and serve failures of the HTTP surface.
///
/// Request-level problems never reach this type; the webhook route answers
/// them inline through the response envelope. What remains is everything
/// that can go wrong before or while the listener runs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to construct the review engine")]
    Engine(#[source] review_engine::Error),

    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),
}

/// Handy result alias for the crate surface.
pub type AppResult<T> = Result<T, AppError>;
