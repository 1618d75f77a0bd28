use async_trait::async_trait;
use bytes::Bytes;
use image::imageops::FilterType;
use serde::ser::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::GateError;
use crate::service::labels::LabelSet;

/// One decoded label with its confidence as a percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Turns raw image bytes into at most `top_k` ranked predictions.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, image: Bytes) -> Result<Vec<Prediction>, GateError>;
}

/// The model itself: a fixed-shape tensor in, one score per label out.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn predict(&self, input: &InputTensor) -> Result<Vec<f32>, GateError>;
}

/// A single image in NHWC layout with the batch dimension elided.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }
}

/// Serializes as nested `[height][width][channels]` arrays, the row format
/// REST model servers accept.
impl Serialize for InputTensor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let row_len = self.width * self.channels;
        serializer.collect_seq(
            self.data
                .chunks(row_len.max(1))
                .map(|row| row.chunks(self.channels.max(1)).collect::<Vec<_>>()),
        )
    }
}

/// Decode, resize to `size x size` RGB and scale pixels to `[-1, 1]`.
pub fn preprocess(image: &[u8], size: u32) -> Result<InputTensor, GateError> {
    let decoded = image::load_from_memory(image)
        .map_err(|e| GateError::InferenceFailed(format!("image decode failed: {e}")))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(GateError::InferenceFailed("image has no pixels".to_string()));
    }

    let rgb = decoded
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();
    let data = rgb
        .pixels()
        .flat_map(|px| px.0)
        .map(|v| f32::from(v) / 127.5 - 1.0)
        .collect();

    Ok(InputTensor {
        height: size as usize,
        width: size as usize,
        channels: 3,
        data,
    })
}

/// Pick the `k` highest scores, map them to labels and convert to percentages.
/// Labels repeated in the table are reported once, at their best score.
pub fn decode_top_k(
    scores: &[f32],
    labels: &LabelSet,
    k: usize,
) -> Result<Vec<Prediction>, GateError> {
    if scores.len() != labels.len() {
        return Err(GateError::InferenceFailed(format!(
            "model returned {} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(GateError::InferenceFailed(
            "model returned non-finite scores".to_string(),
        ));
    }

    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut seen = HashSet::new();
    let predictions = ranked
        .into_iter()
        .filter_map(|(idx, score)| {
            let label = labels.get(idx)?;
            seen.insert(label).then(|| Prediction {
                label: label.to_string(),
                confidence: (f64::from(score) * 100.0).clamp(0.0, 100.0),
            })
        })
        .take(k)
        .collect();
    Ok(predictions)
}

/// Wraps a [`ModelBackend`] with image preprocessing and top-K decoding.
#[derive(Clone)]
pub struct InferenceAdapter {
    backend: Arc<dyn ModelBackend>,
    labels: Arc<LabelSet>,
    input_size: u32,
    top_k: usize,
}

impl InferenceAdapter {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        labels: Arc<LabelSet>,
        input_size: u32,
        top_k: usize,
    ) -> Result<Self, GateError> {
        if labels.is_empty() {
            return Err(GateError::InvalidInput("label table is empty".to_string()));
        }
        if top_k == 0 || input_size == 0 {
            return Err(GateError::InvalidInput(format!(
                "top_k ({top_k}) and input_size ({input_size}) must be positive"
            )));
        }
        Ok(Self {
            backend,
            labels,
            input_size,
            top_k,
        })
    }
}

#[async_trait]
impl ImageClassifier for InferenceAdapter {
    async fn classify(&self, image: Bytes) -> Result<Vec<Prediction>, GateError> {
        let size = self.input_size;
        let tensor = tokio::task::spawn_blocking(move || preprocess(&image, size)).await??;
        debug!(shape = ?tensor.shape(), "image preprocessed");

        let scores = self.backend.predict(&tensor).await?;
        let predictions = decode_top_k(&scores, &self.labels, self.top_k)?;
        if predictions.is_empty() {
            return Err(GateError::InferenceFailed(
                "model produced no predictions".to_string(),
            ));
        }
        Ok(predictions)
    }
}
