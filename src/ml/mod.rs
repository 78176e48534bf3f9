//! Ticket intelligence engine
//!
//! Turns labeled tickets into a reusable model and serves two things from it:
//! - Category suggestion for new text (multinomial logistic regression)
//! - Nearest-neighbor retrieval by cosine similarity over TF-IDF vectors
//!
//! Training runs corpus extraction, vectorizer fit and classifier fit, then
//! hands the artifact to the [`ModelStore`], which persists it and swaps it
//! into the process-wide cache.

pub mod artifact;
pub mod classifier;
pub mod corpus;
pub mod features;
pub mod models;
pub mod predictor;
pub mod service;
pub mod similarity;
pub mod store;
pub mod trainer;

pub use artifact::{ArtifactHeader, ModelArtifact, ARTIFACT_SCHEMA_VERSION};
pub use classifier::{Classifier, LogisticRegressionClassifier};
pub use corpus::CorpusExtractor;
pub use features::TfidfVectorizer;
pub use models::{
    Analyzer, ClassWeight, ClassifierConfig, Corpus, MLConfig, ModelMetrics, ModelStats, Prediction,
    SimilarTicket, SimilarityHit, TrainingExample, TrainingReport, VectorizerConfig,
};
pub use predictor::Predictor;
pub use service::TicketIntelligence;
pub use similarity::{cosine_similarity, SimilarityEngine};
pub use store::{CachedModel, ModelOrigin, ModelStore};
pub use trainer::Trainer;
