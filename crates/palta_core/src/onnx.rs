//! ONNX Runtime backend for [`Classifier`].

use crate::classifier::{Classifier, to_distribution};
use crate::error::ImageError;
use anyhow::Result;
use ndarray::{Array4, CowArray};
use once_cell::sync::Lazy;
use ort::{
    GraphOptimizationLevel, SessionBuilder, environment::Environment, session::Session,
    tensor::OrtOwnedTensor, value::Value,
};
use std::path::Path;
use std::sync::Arc;

static ORT_ENV: Lazy<Arc<Environment>> = Lazy::new(|| {
    Environment::builder()
        .with_name("palta-vision")
        .build()
        .expect("failed to initialize ONNX Runtime environment")
        .into_arc()
});

/// Image classifier backed by an ONNX model exported from the training run.
pub struct OnnxClassifier {
    session: Session,
}

impl OnnxClassifier {
    pub fn new(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("model file missing: {}", model_path.display());
        }
        let env = ORT_ENV.clone();
        let session = SessionBuilder::new(&env)?
            .with_optimization_level(GraphOptimizationLevel::Level1)?
            .with_model_from_file(model_path)?;
        tracing::info!("loaded classifier from {}", model_path.display());
        Ok(Self { session })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ImageError> {
        let input_array = input.clone().into_dyn();
        let cow = CowArray::from(input_array.view());
        let value = Value::from_array(self.session.allocator(), &cow)
            .map_err(|e| ImageError::Inference(format!("could not build input tensor: {e}")))?;
        let outputs: Vec<Value> = self
            .session
            .run(vec![value])
            .map_err(|e| ImageError::Inference(e.to_string()))?;
        let first = outputs
            .first()
            .ok_or_else(|| ImageError::Inference("model produced no output".into()))?;
        let scores: OrtOwnedTensor<f32, _> = first
            .try_extract()
            .map_err(|e| ImageError::Inference(e.to_string()))?;
        let scores: Vec<f32> = scores.view().iter().cloned().collect();
        if scores.is_empty() {
            return Err(ImageError::InvalidOutput("empty model output".into()));
        }
        Ok(to_distribution(&scores))
    }
}
