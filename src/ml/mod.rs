use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::item::Item;
use crate::models::moderation::Prediction;

/// Probability threshold above which an item is flagged as a violation.
const VIOLATION_THRESHOLD: f64 = 0.5;

/// Violation scorer invoked by the worker pool on a cache miss.
///
/// Implementations must be deterministic per item content: two workers
/// computing the same fingerprint concurrently must produce the same
/// prediction, which is what lets the prediction cache skip coordination.
#[async_trait]
pub trait ViolationModel: Send + Sync {
    async fn predict(&self, item: &Item) -> Result<Prediction, ModelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read model weights: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model weights: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Logistic-regression weights over the four normalized ad features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWeights {
    pub bias: f64,
    pub coefficients: [f64; 4],
}

impl Default for ModelWeights {
    fn default() -> Self {
        // Verified sellers and ads with images pull the score down hard;
        // long descriptions and high-numbered categories nudge it up.
        Self {
            bias: 0.6,
            coefficients: [-3.2, -2.4, 0.4, 0.5],
        }
    }
}

/// In-process logistic scorer. Constructed once per process and shared by
/// every worker as an immutable reference.
pub struct LogisticModel {
    weights: ModelWeights,
}

impl LogisticModel {
    pub fn new(weights: ModelWeights) -> Self {
        Self { weights }
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        let weights: ModelWeights = serde_json::from_str(&raw)?;
        Ok(Self::new(weights))
    }

    /// Load weights from `path` when it exists, otherwise fall back to the
    /// built-in defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ModelError> {
        match path {
            Some(p) if Path::new(p).exists() => {
                tracing::info!(path = p, "Loading model weights from file");
                Self::from_file(Path::new(p))
            }
            Some(p) => {
                tracing::warn!(path = p, "Model weights file not found, using defaults");
                Ok(Self::new(ModelWeights::default()))
            }
            None => {
                tracing::info!("No model path configured, using default weights");
                Ok(Self::new(ModelWeights::default()))
            }
        }
    }

    /// Normalize the ad's content fields into the model's feature vector:
    /// `[verified_seller, images_qty/10 (capped), description_len/1000
    /// (capped), category/100]`.
    fn features(item: &Item) -> [f64; 4] {
        [
            if item.seller_is_verified { 1.0 } else { 0.0 },
            (f64::from(item.images_qty) / 10.0).min(1.0),
            (item.description.len() as f64 / 1000.0).min(1.0),
            f64::from(item.category) / 100.0,
        ]
    }

    fn score(&self, item: &Item) -> f64 {
        let features = Self::features(item);
        let z = self.weights.bias
            + features
                .iter()
                .zip(self.weights.coefficients.iter())
                .map(|(x, w)| x * w)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

#[async_trait]
impl ViolationModel for LogisticModel {
    async fn predict(&self, item: &Item) -> Result<Prediction, ModelError> {
        let probability = self.score(item);
        Ok(Prediction {
            is_violation: probability >= VIOLATION_THRESHOLD,
            probability,
        })
    }
}
