//! Logistic classifier over the feature vector
//!
//! Weights come from a JSON file produced by whatever offline training is
//! used; this module only evaluates them.

use super::stub::{base_probability, MAX_BASE_PROBABILITY};
use super::traits::{AudioClip, FeatureVector, RiskClassifier};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model weights, one per feature plus a bias
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub bias: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub snr: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub pitch: f64,
}

impl LinearWeights {
    fn is_finite(&self) -> bool {
        [self.bias, self.duration, self.snr, self.energy, self.pitch]
            .iter()
            .all(|w| w.is_finite())
    }
}

/// Trained-model variant of [`RiskClassifier`]
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weights: LinearWeights,
}

impl LinearClassifier {
    pub fn new(weights: LinearWeights) -> Self {
        Self { weights }
    }

    /// Load weights from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model weights: {:?}", path))?;
        let weights: LinearWeights = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid model weights in {:?}", path))?;
        if !weights.is_finite() {
            bail!("Model weights in {:?} must be finite numbers", path);
        }

        log::info!("Loaded linear model from {:?}: {:?}", path, weights);
        Ok(Self::new(weights))
    }

    pub fn weights(&self) -> &LinearWeights {
        &self.weights
    }
}

impl RiskClassifier for LinearClassifier {
    fn classify(&self, clip: &AudioClip<'_>, features: &FeatureVector) -> f64 {
        let w = &self.weights;
        let z = w.bias
            + w.duration * features.duration_secs as f64
            + w.snr * f64::from(features.snr_db)
            + w.energy * f64::from(features.energy)
            + w.pitch * f64::from(features.pitch_hz);

        // Opposing infinite terms; the score carries no information
        if z.is_nan() {
            log::warn!(
                "Linear score for {:?} is not a number, using the length rule",
                clip.filename
            );
            return base_probability(features.byte_len);
        }

        let probability = 1.0 / (1.0 + (-z).exp());
        probability.clamp(0.0, MAX_BASE_PROBABILITY)
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}
