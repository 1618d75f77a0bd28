use axum::{Json, http::StatusCode, response::IntoResponse};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::{debug, error};

use crate::types::responses::ApiResponse;

#[derive(Debug, ThisError)]
pub enum GateError {
    #[error("account already exists")]
    DuplicateAccount,

    #[error("unknown account")]
    UnknownAccount,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("credits exhausted")]
    CreditsExhausted,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("image fetch failed: {0}")]
    FetchFailed(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("not authorized")]
    NotAuthorized,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl GateError {
    /// Legacy application code carried in the `status_code` body field.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::DuplicateAccount | GateError::UnknownAccount => 301,
            GateError::InvalidCredentials | GateError::NotAuthorized => 302,
            GateError::CreditsExhausted => 303,
            GateError::FetchFailed(_) => 304,
            GateError::InferenceFailed(_) => 305,
            GateError::InvalidInput(_) => 400,
            GateError::PayloadTooLarge => 413,
            _ => 500,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            GateError::DuplicateAccount => StatusCode::CONFLICT,
            GateError::UnknownAccount => StatusCode::NOT_FOUND,
            GateError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            GateError::NotAuthorized => StatusCode::FORBIDDEN,
            GateError::CreditsExhausted => StatusCode::PAYMENT_REQUIRED,
            GateError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            GateError::InferenceFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GateError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GateError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing message. Never includes store, adapter or network details.
    pub fn public_message(&self) -> String {
        match self {
            GateError::DuplicateAccount => "Username already exists.".to_string(),
            GateError::UnknownAccount => "Invalid username.".to_string(),
            GateError::InvalidCredentials => "Invalid password.".to_string(),
            GateError::NotAuthorized => "Invalid admin password.".to_string(),
            GateError::CreditsExhausted => "Your credits are exhausted.".to_string(),
            GateError::FetchFailed(_) => "Could not retrieve an image from the given URL.".to_string(),
            GateError::InferenceFailed(_) => "The image could not be classified.".to_string(),
            GateError::InvalidInput(reason) => format!("Invalid input: {reason}."),
            GateError::PayloadTooLarge => "Request body too large.".to_string(),
            _ => "An internal server error occurred.".to_string(),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> axum::response::Response {
        let status = self.http_status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, "request rejected");
        }
        let body = ApiResponse::message(self.status_code(), self.public_message());
        (status, Json(body)).into_response()
    }
}
