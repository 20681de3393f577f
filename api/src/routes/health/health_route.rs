use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Liveness probe for load balancers and deploy checks.
pub async fn health_route() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}
