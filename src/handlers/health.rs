use axum::Json;

use crate::types::responses::HealthResponse;

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
