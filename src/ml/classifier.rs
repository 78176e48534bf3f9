use crate::error::{AppError, Result};
use crate::ml::models::{ClassWeight, ClassifierConfig, ModelMetrics};
use linfa::prelude::{Dataset, Fit};
use linfa_logistic::{MultiFittedLogisticRegression, MultiLogisticRegression};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Trait for text classifiers operating on vectorized documents
///
/// Classes are label indices `0..n_classes`; mapping them back to category
/// names is the artifact's job, not the classifier's.
pub trait Classifier: Send + Sync {
    /// Train the classifier
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()>;

    /// Predict class probabilities (samples x classes)
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class indices
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(features)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| argmax(row.iter().copied()))
            .collect())
    }

    /// Number of classes the model separates
    fn n_classes(&self) -> usize;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Index of the largest value; the first one wins on ties
pub(crate) fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (idx, value) in values.enumerate() {
        if value > best {
            best = value;
            best_idx = idx;
        }
    }
    best_idx
}

/// Row indices that give every class as many rows as the largest one.
///
/// Rows of a smaller class are cycled in order, so each class weighs in
/// proportion to the inverse of its frequency. Every class in
/// `0..n_classes` must occur in `labels`.
pub(crate) fn balanced_rows(labels: &[usize], n_classes: usize) -> Vec<usize> {
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &label) in labels.iter().enumerate() {
        by_class[label].push(row);
    }

    let target = by_class.iter().map(Vec::len).max().unwrap_or(0);
    by_class
        .iter()
        .filter(|rows| !rows.is_empty())
        .flat_map(|rows| rows.iter().copied().cycle().take(target))
        .collect()
}

/// Multinomial (softmax) logistic regression
#[derive(Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    /// Hyperparameters
    params: ClassifierConfig,

    /// Fitted model
    model: Option<MultiFittedLogisticRegression<f64, usize>>,

    /// Number of classes
    n_classes: usize,

    /// Number of input features
    n_features: usize,
}

impl LogisticRegressionClassifier {
    pub fn new(params: ClassifierConfig) -> Self {
        Self {
            params,
            model: None,
            n_classes: 0,
            n_features: 0,
        }
    }

    /// Train and report metrics on the training set itself
    pub fn train_with_metrics(
        &mut self,
        features: &Array2<f64>,
        labels: &[usize],
        label_names: &[String],
    ) -> Result<ModelMetrics> {
        self.train(features, labels)?;
        let predictions = self.predict(features)?;
        Ok(ModelMetrics::evaluate(labels, &predictions, label_names))
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        if features.nrows() != labels.len() {
            return Err(AppError::Training(format!(
                "feature rows ({}) and labels ({}) differ in length",
                features.nrows(),
                labels.len()
            )));
        }

        // Every index in 0..n_classes must occur, so probability columns
        // (sorted by class) line up with label indices
        let n_classes = labels.iter().max().map_or(0, |&max| max + 1);
        let mut present = vec![false; n_classes];
        for &label in labels {
            present[label] = true;
        }
        if n_classes < 2 || present.iter().any(|&p| !p) {
            return Err(AppError::InsufficientData(format!(
                "classifier needs every class 0..{} represented and at least 2 classes",
                n_classes
            )));
        }

        let dataset = match self.params.class_weight {
            ClassWeight::Uniform => {
                Dataset::new(features.clone(), Array1::from_vec(labels.to_vec()))
            }
            ClassWeight::Balanced => {
                let rows = balanced_rows(labels, n_classes);
                Dataset::new(
                    features.select(Axis(0), &rows),
                    rows.iter().map(|&row| labels[row]).collect::<Array1<usize>>(),
                )
            }
        };

        let model = MultiLogisticRegression::default()
            .alpha(self.params.alpha)
            .max_iterations(self.params.max_iterations)
            .gradient_tolerance(self.params.gradient_tolerance)
            .fit(&dataset)
            .map_err(|e| {
                AppError::Training(format!("Failed to train logistic regression: {}", e))
            })?;

        self.model = Some(model);
        self.n_classes = n_classes;
        self.n_features = features.ncols();

        tracing::debug!(
            n_samples = features.nrows(),
            n_features = self.n_features,
            n_classes = self.n_classes,
            "Logistic regression trained"
        );

        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| AppError::Internal("Classifier not trained".to_string()))?;

        if features.ncols() != self.n_features {
            return Err(AppError::Validation(format!(
                "expected {} features, got {}",
                self.n_features,
                features.ncols()
            )));
        }

        let proba = model.predict_probabilities(features);
        if proba.ncols() != self.n_classes {
            return Err(AppError::Internal(format!(
                "classifier produced {} probability columns for {} classes",
                proba.ncols(),
                self.n_classes
            )));
        }

        Ok(proba)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}
