use std::sync::Arc;

use crate::classifier::argmax;
use crate::error::{InferenceError, PredictError};
use crate::models::{ClassProbability, PredictionRequest, PredictionResult};
use crate::normalize::normalize;
use crate::registry::ModelRegistry;

/// Label returned when the top class is not confident enough.
pub const OTHERS_LABEL: &str = "Others";
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Runs normalization, model lookup and thresholding for one request.
#[derive(Clone)]
pub struct EmotionPredictor {
    registry: Arc<ModelRegistry>,
}

impl EmotionPredictor {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictError> {
        if !(0.0..=1.0).contains(&request.threshold) {
            return Err(InferenceError::InvalidThreshold(request.threshold).into());
        }

        let text = normalize(&request.text);
        let (label, model) = self.registry.get(&request.model)?;
        if text.is_empty() {
            return Err(InferenceError::EmptyInput.into());
        }

        let classes = model.classes();
        let batch = [text.as_str()];

        let probabilities = single(model.predict_proba(&batch)?)?;
        if probabilities.len() != classes.len() {
            return Err(InferenceError::ClassCount {
                expected: classes.len(),
                actual: probabilities.len(),
            }
            .into());
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::NonFinite.into());
        }

        let top = argmax(&probabilities).ok_or(InferenceError::ClassCount {
            expected: classes.len(),
            actual: 0,
        })?;
        let max_probability = probabilities[top];
        let confidence = max_probability * 100.0;

        if max_probability < request.threshold {
            tracing::debug!(model = %label, confidence, "below threshold");
            return Ok(PredictionResult {
                model: label,
                normalized_text: text,
                label: OTHERS_LABEL.to_string(),
                confidence,
                distribution: None,
            });
        }

        let predicted = single(model.predict(&batch)?)?;
        if predicted != classes[top] {
            tracing::warn!(
                model = %label,
                predicted = %predicted,
                top_class = %classes[top],
                "label and probability calls disagree"
            );
        }

        let distribution = classes
            .iter()
            .zip(&probabilities)
            .map(|(class, p)| ClassProbability {
                label: class.clone(),
                probability: p * 100.0,
            })
            .collect();

        Ok(PredictionResult {
            model: label,
            normalized_text: text,
            label: predicted,
            confidence,
            distribution: Some(distribution),
        })
    }
}

/// Unwrap a one-element batch.
fn single<T>(batch: Vec<T>) -> Result<T, InferenceError> {
    let actual = batch.len();
    let mut items = batch.into_iter();
    match (items.next(), actual) {
        (Some(item), 1) => Ok(item),
        _ => Err(InferenceError::BatchSize {
            expected: 1,
            actual,
        }),
    }
}
