use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::service::classifier::Prediction;

/// Uniform response envelope returned by every endpoint.
///
/// `status_code` keeps the legacy numbering (200 ok, 301 unknown/duplicate
/// user, 302 bad password, 303 exhausted, 400 bad input, ...). `predictions`
/// and `credits` are only present on the successful calls that produce them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<i64>,
}

impl ApiResponse {
    pub fn message(status_code: u16, msg: impl Into<String>) -> Self {
        Self {
            status_code,
            msg: msg.into(),
            predictions: None,
            credits: None,
        }
    }

    pub fn ok(msg: impl Into<String>) -> Self {
        Self::message(200, msg)
    }

    pub fn with_credits(mut self, credits: i64) -> Self {
        self.credits = Some(credits);
        self
    }

    pub fn with_predictions(mut self, predictions: &[Prediction]) -> Self {
        let map = predictions
            .iter()
            .map(|p| (p.label.clone(), p.confidence))
            .collect();
        self.predictions = Some(map);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
