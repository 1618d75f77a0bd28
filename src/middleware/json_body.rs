use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
};
use serde::de::DeserializeOwned;

use crate::error::GateError;

/// JSON body extractor whose rejections use the gateway's response envelope
/// (`status_code: 400`) instead of axum's plain-text errors.
pub struct GateJson<T>(pub T);

impl<S, T> FromRequest<S> for GateJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = GateError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(GateJson(value)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(GateError::PayloadTooLarge)
            }
            Err(rejection) => Err(GateError::InvalidInput(rejection.body_text())),
        }
    }
}
