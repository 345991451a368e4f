use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use crate::{
    error::{EngineError, EngineResult},
    services::surprise::ENSEMBLE_FEATURE_LEN,
};

/// A pretrained binary classifier producing a probability-like score
pub trait Classifier: Send + Sync {
    fn score(&self, features: &[f64]) -> EngineResult<f64>;
}

/// Linear model with a sigmoid link
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LogisticClassifier {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

impl Classifier for LogisticClassifier {
    fn score(&self, features: &[f64]) -> EngineResult<f64> {
        if features.len() != self.weights.len() {
            return Err(EngineError::Model(format!(
                "expected {} features, got {}",
                self.weights.len(),
                features.len()
            )));
        }
        let z: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

/// Outputs of the four surprise classifiers for one feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleScores {
    pub fam_high: f64,
    pub fam_low: f64,
    pub surp_pos: f64,
    pub surp_neg: f64,
}

impl EnsembleScores {
    pub fn net_familiarity(&self) -> f64 {
        self.fam_low - self.fam_high
    }

    pub fn net_surprise(&self) -> f64 {
        self.surp_pos - self.surp_neg
    }

    /// Larger of the two net scores
    pub fn combined(&self) -> f64 {
        self.net_familiarity().max(self.net_surprise())
    }
}

/// The four named classifiers, loaded once at start-up
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClassifierEnsemble {
    pub fam_high: LogisticClassifier,
    pub fam_low: LogisticClassifier,
    pub surp_pos: LogisticClassifier,
    pub surp_neg: LogisticClassifier,
}

impl ClassifierEnsemble {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read surprise model {}", path.display()))?;
        let ensemble: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse surprise model {}", path.display()))?;
        ensemble
            .check_dimensions(ENSEMBLE_FEATURE_LEN)
            .with_context(|| format!("Invalid surprise model {}", path.display()))?;
        Ok(ensemble)
    }

    /// Number of features every classifier expects
    pub fn feature_len(&self) -> usize {
        self.fam_high.weights.len()
    }

    /// Every classifier must take exactly `expected` features
    fn check_dimensions(&self, expected: usize) -> anyhow::Result<()> {
        for (name, model) in [
            ("fam_high", &self.fam_high),
            ("fam_low", &self.fam_low),
            ("surp_pos", &self.surp_pos),
            ("surp_neg", &self.surp_neg),
        ] {
            anyhow::ensure!(
                model.weights.len() == expected,
                "{} has {} weights, expected {}",
                name,
                model.weights.len(),
                expected
            );
        }
        Ok(())
    }

    pub fn score(&self, features: &[f64]) -> EngineResult<EnsembleScores> {
        Ok(EnsembleScores {
            fam_high: self.fam_high.score(features)?,
            fam_low: self.fam_low.score(features)?,
            surp_pos: self.surp_pos.score(features)?,
            surp_neg: self.surp_neg.score(features)?,
        })
    }
}
