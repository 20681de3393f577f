use chrono::{DateTime, Utc};
use serde::Serialize;

/// Acknowledgement body returned for every webhook delivery we understood.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// One of `queued`, `duplicate`, `ignored`.
    pub status: &'static str,
    /// Review key `owner/repo#pr@sha` for deliveries that map onto a review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// True when this delivery cancelled an older in-flight review of the PR.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub superseded: bool,
    pub received_at: DateTime<Utc>,
}

impl WebhookAck {
    pub fn queued(key: String, superseded: bool) -> Self {
        Self {
            status: "queued",
            key: Some(key),
            superseded,
            received_at: Utc::now(),
        }
    }

    pub fn duplicate(key: String) -> Self {
        Self {
            status: "duplicate",
            key: Some(key),
            superseded: false,
            received_at: Utc::now(),
        }
    }

    pub fn ignored() -> Self {
        Self {
            status: "ignored",
            key: None,
            superseded: false,
            received_at: Utc::now(),
        }
    }
}
