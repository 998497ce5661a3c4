//! Classifier boundary: the model contract and the per-image result it yields.

use crate::error::{DiagnosisError, ImageError};
use crate::labels::LabelSet;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Allowed deviation of a probability vector's sum from 1.
pub const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

/// A pre-trained image classifier. Implementations must be safe to call
/// concurrently; inference has no side effects.
pub trait Classifier: Send + Sync {
    /// Returns one probability per label, in label-set order.
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ImageError>;
}

/// Process-wide handle to the loaded classifier, constructed once at start-up
/// and handed to the request layer. An unavailable service refuses all work.
#[derive(Clone)]
pub struct ClassifierService {
    classifier: Option<Arc<dyn Classifier>>,
    labels: LabelSet,
}

impl ClassifierService {
    pub fn new(classifier: Arc<dyn Classifier>, labels: LabelSet) -> Self {
        Self {
            classifier: Some(classifier),
            labels,
        }
    }

    pub fn unavailable(labels: LabelSet) -> Self {
        Self {
            classifier: None,
            labels,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// The loaded classifier, or [`DiagnosisError::ModelUnavailable`].
    pub fn require(&self) -> Result<Arc<dyn Classifier>, DiagnosisError> {
        self.classifier
            .clone()
            .ok_or(DiagnosisError::ModelUnavailable)
    }
}

impl fmt::Debug for ClassifierService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierService")
            .field("ready", &self.is_ready())
            .field("labels", &self.labels)
            .finish()
    }
}

/// Outcome for one successfully processed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    /// Identifier returned by the image store.
    pub source: String,
    pub label: String,
    pub label_index: usize,
    /// Probability of the predicted label, in percent.
    pub confidence: f64,
    pub probabilities: Vec<f32>,
}

impl ImageResult {
    /// Validates `probabilities` against `labels` and derives the prediction
    /// (argmax, first maximum on ties).
    pub fn from_probabilities(
        source: impl Into<String>,
        probabilities: Vec<f32>,
        labels: &LabelSet,
    ) -> Result<Self, ImageError> {
        validate_distribution(&probabilities, labels.len())?;
        let (label_index, best) = argmax(&probabilities)
            .ok_or_else(|| ImageError::InvalidOutput("empty probability vector".into()))?;
        let label = labels
            .get(label_index)
            .ok_or_else(|| ImageError::InvalidOutput(format!("no label at index {label_index}")))?
            .to_string();
        Ok(Self {
            source: source.into(),
            label,
            label_index,
            confidence: f64::from(best) * 100.0,
            probabilities,
        })
    }
}

fn validate_distribution(probs: &[f32], expected_len: usize) -> Result<(), ImageError> {
    if probs.len() != expected_len {
        return Err(ImageError::InvalidOutput(format!(
            "expected {expected_len} probabilities, got {}",
            probs.len()
        )));
    }
    if let Some(bad) = probs
        .iter()
        .find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0)
    {
        return Err(ImageError::InvalidOutput(format!(
            "probability {bad} outside [0,1]"
        )));
    }
    let sum: f32 = probs.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(ImageError::InvalidOutput(format!(
            "probabilities sum to {sum}"
        )));
    }
    Ok(())
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((idx, v)),
        }
    }
    best
}

/// Turns raw model scores into a distribution. Scores that already form one
/// (a softmax head) pass through unchanged; anything else is treated as
/// logits.
pub fn to_distribution(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    if in_range && (sum - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE {
        return scores.to_vec();
    }
    softmax(scores)
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|x| x / sum).collect()
}
