use axum::{Json, extract::State};

use crate::middleware::GateJson;
use crate::router::GateState;
use crate::types::requests::{ClassifyRequest, RefillRequest, RegisterRequest};
use crate::types::responses::ApiResponse;
use crate::GateError;

/// POST /register
pub async fn register_handler(
    State(state): State<GateState>,
    GateJson(req): GateJson<RegisterRequest>,
) -> Result<Json<ApiResponse>, GateError> {
    state.accounts.register(&req.username, &req.password).await?;
    Ok(Json(ApiResponse::ok("Registered successfully.")))
}

/// POST /classify
pub async fn classify_handler(
    State(state): State<GateState>,
    GateJson(req): GateJson<ClassifyRequest>,
) -> Result<Json<ApiResponse>, GateError> {
    let account = state
        .accounts
        .authenticate(&req.username, &req.password)
        .await?;
    let result = state.accounts.classify(&account, &req.url).await?;

    Ok(Json(
        ApiResponse::ok("Image classified.")
            .with_predictions(&result.predictions)
            .with_credits(result.credits_remaining),
    ))
}

/// POST /refill
pub async fn refill_handler(
    State(state): State<GateState>,
    GateJson(req): GateJson<RefillRequest>,
) -> Result<Json<ApiResponse>, GateError> {
    let credits = state
        .accounts
        .refill(&req.username, &req.admin_pw, req.amount)
        .await?;
    Ok(Json(ApiResponse::ok("Refill completed.").with_credits(credits)))
}
