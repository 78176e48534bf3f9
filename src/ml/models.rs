use crate::models::TicketId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLConfig {
    /// Fixed location of the model artifact (overwritten on every train)
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Minimum number of labeled tickets needed to train
    #[serde(default = "default_min_examples")]
    pub min_examples: usize,

    /// Minimum number of distinct categories needed to train
    #[serde(default = "default_min_distinct_labels")]
    pub min_distinct_labels: usize,

    /// Upper bound for `top_k` in similarity queries
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// `top_k` used when the caller does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Text vectorizer configuration
    #[serde(default)]
    pub vectorizer: VectorizerConfig,

    /// Classifier hyperparameters
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for MLConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            min_examples: default_min_examples(),
            min_distinct_labels: default_min_distinct_labels(),
            max_top_k: default_max_top_k(),
            default_top_k: default_top_k(),
            vectorizer: VectorizerConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("./data/models/ticket_classifier.bin")
}

fn default_min_examples() -> usize {
    2
}

fn default_min_distinct_labels() -> usize {
    2
}

fn default_max_top_k() -> usize {
    20
}

fn default_top_k() -> usize {
    5
}

/// How raw text is split into terms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Analyzer {
    /// Word n-grams over alphanumeric tokens of two or more characters
    Word,
    /// Character n-grams taken inside space-padded words
    CharWb,
}

/// Text vectorizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Term analyzer
    #[serde(default = "default_analyzer")]
    pub analyzer: Analyzer,

    /// N-gram range (min, max), inclusive
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),

    /// Minimum document frequency for terms
    #[serde(default = "default_min_doc_freq")]
    pub min_doc_freq: usize,

    /// Keep only the most frequent terms (unlimited when unset)
    #[serde(default)]
    pub max_features: Option<usize>,

    /// Lowercase text before analysis
    #[serde(default = "default_true")]
    pub lowercase: bool,

    /// Use 1 + ln(tf) instead of the raw count
    #[serde(default)]
    pub sublinear_tf: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            analyzer: default_analyzer(),
            ngram_range: default_ngram_range(),
            min_doc_freq: default_min_doc_freq(),
            max_features: None,
            lowercase: true,
            sublinear_tf: false,
        }
    }
}

fn default_analyzer() -> Analyzer {
    Analyzer::CharWb
}

fn default_ngram_range() -> (usize, usize) {
    (3, 5)
}

fn default_min_doc_freq() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Multinomial logistic regression hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// L2 penalty
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Solver iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    /// Solver stops once the gradient norm falls below this
    #[serde(default = "default_gradient_tolerance")]
    pub gradient_tolerance: f64,

    /// Per-class weighting of training rows
    #[serde(default)]
    pub class_weight: ClassWeight,
}

/// How much each training row counts, by class
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every row counts once
    Uniform,
    /// Rows count inversely to their class frequency, so rare categories
    /// weigh as much as common ones
    #[default]
    Balanced,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            max_iterations: default_max_iterations(),
            gradient_tolerance: default_gradient_tolerance(),
            class_weight: ClassWeight::default(),
        }
    }
}

fn default_alpha() -> f64 {
    0.01
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_gradient_tolerance() -> f64 {
    1e-6
}

/// One labeled document of the training corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Title and description joined
    pub text: String,

    /// Category
    pub label: String,
}

impl TrainingExample {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Training corpus with the ticket ids its examples came from
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Examples, ascending ticket id
    pub examples: Vec<TrainingExample>,

    /// Parallel to `examples`
    pub record_ids: Vec<TicketId>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.text.as_str()).collect()
    }

    /// Distinct labels, sorted ascending
    pub fn label_set(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.examples.iter().map(|e| e.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

/// Outcome of a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Number of training examples
    pub sample_count: usize,

    /// Number of distinct categories
    pub class_count: usize,

    /// Categories, sorted ascending
    pub class_labels: Vec<String>,

    /// Where the artifact was written
    pub storage_location: String,

    /// Number of vectorizer terms
    pub vocabulary_size: usize,

    /// Metrics on the training set itself
    pub training_metrics: ModelMetrics,

    pub trained_at: DateTime<Utc>,
}

/// Category suggestion for a single text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    /// Predicted category
    pub label: String,

    /// Probability of `label` (0.0 - 1.0), when the classifier is calibrated
    pub confidence: Option<f64>,

    /// Probability of every category, keyed by label
    pub probabilities: BTreeMap<String, f64>,
}

/// One nearest-neighbor result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityHit {
    pub record_id: TicketId,

    /// Cosine similarity in [-1, 1]
    pub score: f64,
}

/// Similarity hit enriched with the ticket it points to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarTicket {
    pub id: TicketId,
    pub title: String,
    pub status: crate::models::TicketStatus,
    pub category: Option<String>,
    pub similarity: f64,
}

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Per-class metrics, keyed by label
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    /// Compare true and predicted label indices; `labels[i]` names class `i`
    pub fn evaluate(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Self {
        let n_samples = y_true.len();
        if n_samples == 0 || labels.is_empty() {
            return Self::default();
        }

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count();
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = BTreeMap::new();

        for (class_idx, label) in labels.iter().enumerate() {
            let pairs = || y_true.iter().zip(y_pred.iter());

            let tp = pairs()
                .filter(|(t, p)| **t == class_idx && **p == class_idx)
                .count();
            let fp = pairs()
                .filter(|(t, p)| **p == class_idx && **t != class_idx)
                .count();
            let fn_count = pairs()
                .filter(|(t, p)| **t == class_idx && **p != class_idx)
                .count();

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                label.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score,
                    support: y_true.iter().filter(|&&t| t == class_idx).count(),
                },
            );
        }

        let n_classes = labels.len() as f64;
        let precision = per_class.values().map(|m| m.precision).sum::<f64>() / n_classes;
        let recall = per_class.values().map(|m| m.recall).sum::<f64>() / n_classes;
        let f1_score = per_class.values().map(|m| m.f1_score).sum::<f64>() / n_classes;

        Self {
            accuracy,
            precision,
            recall,
            f1_score,
            per_class_metrics: per_class,
        }
    }
}

/// Snapshot of what the engine currently has loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStats {
    pub is_trained: bool,
    pub sample_count: usize,
    pub class_labels: Vec<String>,
    pub vocabulary_size: usize,
    pub trained_at: Option<DateTime<Utc>>,
    pub cached_at: Option<DateTime<Utc>>,
    pub storage_location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ml_config_default() {
        let config = MLConfig::default();
        assert_eq!(config.min_examples, 2);
        assert_eq!(config.min_distinct_labels, 2);
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.vectorizer.analyzer, Analyzer::CharWb);
        assert!(config.vectorizer.lowercase);
        assert_eq!(config.classifier.class_weight, ClassWeight::Balanced);
    }

    #[test]
    fn test_class_weight_from_config_text() {
        let config: ClassifierConfig =
            serde_json::from_str(r#"{"class_weight": "uniform"}"#).unwrap();
        assert_eq!(config.class_weight, ClassWeight::Uniform);
        assert_eq!(config.max_iterations, 1000);
    }

    #[test]
    fn test_corpus_label_set_is_sorted_and_distinct() {
        let corpus = Corpus {
            examples: vec![
                TrainingExample::new("a", "bug"),
                TrainingExample::new("b", "billing"),
                TrainingExample::new("c", "bug"),
            ],
            record_ids: vec![1, 2, 3],
        };

        assert_eq!(corpus.label_set(), vec!["billing", "bug"]);
        assert_eq!(corpus.texts(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_metrics_perfect_predictions() {
        let labels = vec!["billing".to_string(), "bug".to_string()];
        let metrics = ModelMetrics::evaluate(&[0, 1, 0, 1], &[0, 1, 0, 1], &labels);

        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.f1_score, 1.0);
        assert_eq!(metrics.per_class_metrics["bug"].support, 2);
    }

    #[test]
    fn test_metrics_partial_predictions() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let metrics = ModelMetrics::evaluate(&[0, 0, 1, 1], &[0, 1, 1, 1], &labels);

        assert_eq!(metrics.accuracy, 0.75);
        assert_eq!(metrics.per_class_metrics["a"].precision, 1.0);
        assert_eq!(metrics.per_class_metrics["a"].recall, 0.5);
        assert!((metrics.per_class_metrics["b"].precision - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_empty_input() {
        let metrics = ModelMetrics::evaluate(&[], &[], &[]);
        assert_eq!(metrics, ModelMetrics::default());
    }
}
