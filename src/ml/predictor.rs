use crate::error::{AppError, Result};
use crate::ml::classifier::{argmax, Classifier};
use crate::ml::models::Prediction;
use crate::ml::store::ModelStore;
use ndarray::Axis;
use std::sync::Arc;

/// Suggests a category for free text using the cached model
pub struct Predictor {
    model_store: Arc<ModelStore>,
}

impl Predictor {
    pub fn new(model_store: Arc<ModelStore>) -> Self {
        Self { model_store }
    }

    /// Classify `text`. `ModelNotTrained` propagates from the store.
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let cached = self.model_store.load()?;
        let artifact = &cached.artifact;

        let features = artifact.vectorizer.transform(text)?.insert_axis(Axis(0));
        let proba = artifact.classifier.predict_proba(&features)?;
        let row = proba.row(0);

        let best = argmax(row.iter().copied());
        let label = artifact
            .label_set
            .get(best)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("class index {} out of range", best)))?;

        let probabilities = artifact
            .label_set
            .iter()
            .cloned()
            .zip(row.iter().copied())
            .collect();

        tracing::debug!(label = %label, confidence = row[best], "Ticket classified");

        Ok(Prediction {
            label,
            confidence: Some(row[best]),
            probabilities,
        })
    }
}
