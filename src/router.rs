use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;

use crate::handlers::account::{classify_handler, refill_handler, register_handler};
use crate::handlers::health::health_handler;
use crate::service::AccountService;

pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct GateState {
    pub accounts: Arc<AccountService>,
}

impl GateState {
    pub fn new(accounts: AccountService) -> Self {
        Self {
            accounts: Arc::new(accounts),
        }
    }
}

pub fn gate_router(state: GateState) -> Router {
    gate_router_with_limit(state, DEFAULT_BODY_LIMIT)
}

pub fn gate_router_with_limit(state: GateState, body_limit: usize) -> Router {
    Router::new()
        .route("/register", post(register_handler))
        .route("/classify", post(classify_handler))
        .route("/refill", post(refill_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
