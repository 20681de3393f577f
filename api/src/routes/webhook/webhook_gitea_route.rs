use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use review_engine::{IntakeError, IntakeOutcome, SIGNATURE_HEADER};
use tracing::{debug, info, instrument, warn};

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    routes::webhook::webhook_ack::WebhookAck,
};

/// Gitea pull-request webhook intake.
///
/// Verifies the `X-Gitea-Signature` HMAC when a secret is configured, parses
/// the delivery and hands accepted events to the review engine. The reply is
/// sent before any review work happens; Gitea only needs the acknowledgement.
#[instrument(name = "webhook_gitea_route", skip(state, headers, body))]
pub async fn webhook_gitea_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(id) = headers.get("X-Request-Id").and_then(|h| h.to_str().ok()) {
        debug!(%id, "request id attached");
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    match state.engine.submit(&body, signature) {
        Ok(IntakeOutcome::Accepted { key, superseded }) => {
            info!(%key, superseded, "review queued");
            ApiResponse::success(WebhookAck::queued(key.to_string(), superseded))
                .into_response_with_status(StatusCode::ACCEPTED)
        }
        Ok(IntakeOutcome::Duplicate { key }) => {
            debug!(%key, "duplicate delivery acknowledged");
            ApiResponse::success(WebhookAck::duplicate(key.to_string()))
                .into_response_with_status(StatusCode::OK)
        }
        Ok(IntakeOutcome::Ignored { action }) => {
            debug!(%action, "delivery ignored");
            ApiResponse::success(WebhookAck::ignored()).into_response_with_status(StatusCode::OK)
        }
        Err(error @ (IntakeError::MissingSignature | IntakeError::BadSignature)) => {
            warn!(%error, "webhook signature rejected");
            ApiResponse::<()>::error("UNAUTHORIZED", error.to_string())
                .into_response_with_status(StatusCode::UNAUTHORIZED)
        }
        Err(IntakeError::Malformed { field, reason }) => {
            warn!(field, %reason, "malformed webhook payload");
            ApiResponse::<()>::field_error(
                "UNPROCESSABLE",
                "Webhook payload failed validation.",
                field,
                reason,
            )
            .into_response_with_status(StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}
