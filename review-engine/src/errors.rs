//! Crate-wide error hierarchy for the review engine.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - SCM-aware mapping (401→Unauthorized, 429→RateLimited, 5xx→Server, etc.).
//! - `is_transient()` classification feeding the retry policy.
//! - No dynamic dispatch, no async-trait, ergonomic `?` via `From` impls.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type ReviewResult<T> = Result<T, Error>;

/// Root error type for the review engine.
#[derive(Debug, Error)]
pub enum Error {
    /// SCM (Gitea) related failure.
    #[error(transparent)]
    Scm(#[from] ScmError),

    /// LLM call failure surfaced from llm-service.
    #[error(transparent)]
    Llm(#[from] llm_service::LlmError),

    /// Configuration snapshot problems; fatal at load time.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Webhook intake rejection (signature / malformed payload).
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// Run was superseded by a newer head SHA and stopped cooperatively.
    #[error("review run cancelled by a newer head")]
    Cancelled,

    /// Input validation errors (bad identifiers, impossible arguments).
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// True for failures worth retrying with backoff. Everything else fails
    /// the attempt immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Scm(e) => e.is_transient(),
            Error::Llm(e) => e.is_transient(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Detailed SCM-side error used inside the gateway layer.
#[derive(Debug, Error)]
pub enum ScmError {
    /// Unauthorized (HTTP 401).
    #[error("scm unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("scm forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("scm not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("scm rate limited")]
    RateLimited,

    /// Server error (HTTP 5xx).
    #[error("scm server error: status {0}")]
    Server(u16),

    /// Other HTTP status (4xx/3xx) not covered above.
    #[error("scm http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("scm timeout")]
    Timeout,

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("scm network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of an SCM response.
    #[error("scm invalid response: {0}")]
    InvalidResponse(String),
}

impl ScmError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScmError::Timeout | ScmError::Network(_) | ScmError::Server(_) | ScmError::RateLimited
        )
    }

    /// Status-code mapping shared by the `From<reqwest::Error>` impl and
    /// call sites that branch on the status before consuming it.
    pub fn from_status(code: u16) -> Self {
        match code {
            401 => ScmError::Unauthorized,
            403 => ScmError::Forbidden,
            404 => ScmError::NotFound,
            429 => ScmError::RateLimited,
            500..=599 => ScmError::Server(code),
            _ => ScmError::HttpStatus(code),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("invalid config: {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Webhook intake rejections, mapped to HTTP statuses by the api crate.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Signature header absent while a webhook secret is configured (401).
    #[error("webhook signature missing")]
    MissingSignature,

    /// Signature present but does not match the body (401).
    #[error("webhook signature mismatch")]
    BadSignature,

    /// Payload failed structural validation (422).
    #[error("malformed webhook payload: {field}: {reason}")]
    Malformed {
        field: &'static str,
        reason: String,
    },
}

/// Unified diff parser errors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid hunk header: {0}")]
    InvalidHunkHeader(String),
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Scm(ScmError::from(e))
    }
}

impl From<reqwest::Error> for ScmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ScmError::Timeout;
        }
        if let Some(status) = e.status() {
            return ScmError::from_status(status.as_u16());
        }
        ScmError::Network(e.to_string())
    }
}
