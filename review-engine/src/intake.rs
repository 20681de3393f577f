//! Webhook intake: HMAC signature verification and payload filtering.
//!
//! Only `opened` and `synchronize` pull-request actions start a review;
//! every other action is acknowledged and dropped. Structural problems in
//! a trigger payload surface as [`IntakeError::Malformed`] so the HTTP
//! layer can answer 422 with the offending field.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
    errors::IntakeError,
    scm::types::{RepoId, ReviewKey, ReviewRequest, TriggerAction},
};

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "X-Gitea-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Checks the webhook signature against the shared secret. The comparison
/// runs in constant time via `Mac::verify_slice`.
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    provided: Option<&str>,
) -> Result<(), IntakeError> {
    let provided = provided.ok_or(IntakeError::MissingSignature)?;
    let digest = hex::decode(provided.trim()).map_err(|_| IntakeError::BadSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| IntakeError::BadSignature)?;
    mac.update(body);
    mac.verify_slice(&digest).map_err(|_| IntakeError::BadSignature)
}

/// Outcome of payload parsing, before idempotency is consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// A trigger action with a complete identity.
    Review(ReviewRequest),
    /// A valid pull-request event we do not act on.
    Ignored { action: String },
}

/// What intake did with one verified, parsed delivery. The HTTP layer maps
/// these onto statuses: `Accepted` answers 202, the no-op outcomes 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// A review run was queued for this key.
    Accepted {
        key: ReviewKey,
        /// True when the run displaced an in-flight review of an older
        /// head of the same PR.
        superseded: bool,
    },
    /// The key was already known; nothing was queued.
    Duplicate { key: ReviewKey },
    /// A pull-request action outside the trigger set.
    Ignored { action: String },
}

/// Parses a pull-request webhook body into a [`ReviewRequest`].
pub fn parse_event(body: &[u8]) -> Result<ParsedEvent, IntakeError> {
    let payload: WebhookPayload = serde_json::from_slice(body).map_err(|e| {
        IntakeError::Malformed {
            field: "body",
            reason: e.to_string(),
        }
    })?;

    let action = payload.action.ok_or(IntakeError::Malformed {
        field: "action",
        reason: "missing".into(),
    })?;
    let action = match action.as_str() {
        "opened" => TriggerAction::Opened,
        "synchronize" => TriggerAction::Synchronize,
        // Non-trigger actions are dropped before deeper validation; Gitea
        // sends the same envelope for closes, labels, assignments.
        _ => return Ok(ParsedEvent::Ignored { action }),
    };

    let pr = payload.pull_request.ok_or(IntakeError::Malformed {
        field: "pull_request",
        reason: "missing".into(),
    })?;
    let pr_number = pr.number.ok_or(IntakeError::Malformed {
        field: "pull_request.number",
        reason: "missing".into(),
    })?;
    let head_sha = pr
        .head
        .and_then(|h| h.sha)
        .filter(|sha| !sha.trim().is_empty())
        .ok_or(IntakeError::Malformed {
            field: "pull_request.head.sha",
            reason: "missing or empty".into(),
        })?;

    let full_name = payload
        .repository
        .and_then(|r| r.full_name)
        .ok_or(IntakeError::Malformed {
            field: "repository.full_name",
            reason: "missing".into(),
        })?;
    let repo = RepoId::parse(&full_name).ok_or(IntakeError::Malformed {
        field: "repository.full_name",
        reason: format!("expected owner/name, got {full_name:?}"),
    })?;

    Ok(ParsedEvent::Review(ReviewRequest {
        repo,
        pr_number,
        head_sha,
        action,
    }))
}

/// --- webhook payload shapes (subset of fields we actually use) ---
///
/// Every field is optional so a missing one maps to a precise 422 instead
/// of an opaque deserialization error.

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    action: Option<String>,
    pull_request: Option<PullRequestBody>,
    repository: Option<RepositoryBody>,
}

#[derive(Debug, Deserialize)]
struct PullRequestBody {
    number: Option<u64>,
    head: Option<HeadBody>,
}

#[derive(Debug, Deserialize)]
struct HeadBody {
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryBody {
    full_name: Option<String>,
}
