use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::config::ClassifierConfig;
use crate::error::GateError;
use crate::service::classifier::{InputTensor, ModelBackend};

/// Client for a TensorFlow-Serving style REST predict endpoint
/// (`POST .../v1/models/<name>:predict`).
#[derive(Clone)]
pub struct ModelServerApi {
    client: reqwest::Client,
    endpoint: Url,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [&'a InputTensor; 1],
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

impl ModelServerApi {
    pub fn new(cfg: &ClassifierConfig) -> Result<Self, GateError> {
        let endpoint = Url::parse(&cfg.endpoint).map_err(|e| {
            GateError::InvalidInput(format!("classifier endpoint `{}`: {e}", cfg.endpoint))
        })?;
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .no_proxy()
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ModelBackend for ModelServerApi {
    async fn predict(&self, input: &InputTensor) -> Result<Vec<f32>, GateError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&PredictRequest { instances: [input] })
            .send()
            .await
            .map_err(|e| {
                error!(endpoint = %self.endpoint, error = %e, "model server unreachable");
                GateError::InferenceFailed("model server unreachable".to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(endpoint = %self.endpoint, %status, body = %body, "model server rejected request");
            return Err(GateError::InferenceFailed(format!(
                "model server status {status}"
            )));
        }

        let payload: PredictResponse = resp
            .json()
            .await
            .map_err(|e| GateError::InferenceFailed(format!("bad model response: {e}")))?;
        let scores = payload
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| GateError::InferenceFailed("empty prediction batch".to_string()))?;
        debug!(classes = scores.len(), "model server responded");
        Ok(scores)
    }
}
