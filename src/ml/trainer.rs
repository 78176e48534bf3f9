use crate::error::{AppError, Result};
use crate::ml::artifact::ModelArtifact;
use crate::ml::classifier::LogisticRegressionClassifier;
use crate::ml::corpus::CorpusExtractor;
use crate::ml::features::TfidfVectorizer;
use crate::ml::models::{MLConfig, TrainingReport};
use crate::ml::store::ModelStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Corpus -> vectorizer -> classifier -> model store
pub struct Trainer {
    extractor: CorpusExtractor,
    model_store: Arc<ModelStore>,
    config: MLConfig,
}

impl Trainer {
    pub fn new(extractor: CorpusExtractor, model_store: Arc<ModelStore>, config: MLConfig) -> Self {
        Self {
            extractor,
            model_store,
            config,
        }
    }

    /// Fit a fresh model on every labeled ticket and replace the stored one.
    ///
    /// Nothing from a previous model is reused. If the write fails the
    /// previously cached model stays in service.
    pub async fn train(&self) -> Result<TrainingReport> {
        let corpus = self.extractor.extract().await?;
        let started = std::time::Instant::now();

        let label_set = corpus.label_set();
        let label_index: HashMap<&str, usize> = label_set
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.as_str(), idx))
            .collect();
        let labels: Vec<usize> = corpus
            .examples
            .iter()
            .map(|e| {
                label_index.get(e.label.as_str()).copied().ok_or_else(|| {
                    AppError::Internal(format!("label {} missing from label set", e.label))
                })
            })
            .collect::<Result<_>>()?;

        let mut vectorizer = TfidfVectorizer::new(self.config.vectorizer.clone());
        let vectors = vectorizer.fit_transform(&corpus.texts())?;

        let mut classifier = LogisticRegressionClassifier::new(self.config.classifier.clone());
        let training_metrics = classifier.train_with_metrics(&vectors, &labels, &label_set)?;

        let artifact = ModelArtifact {
            vectorizer,
            classifier,
            label_set,
            training_sample_count: corpus.len(),
            trained_corpus_vectors: vectors,
            source_record_ids: corpus.record_ids,
            training_metrics,
            trained_at: Utc::now(),
        };

        let cached = self.model_store.save(artifact)?;
        let artifact = &cached.artifact;

        info!(
            samples = artifact.training_sample_count,
            classes = artifact.label_set.len(),
            vocabulary = artifact.vocabulary_size(),
            accuracy = artifact.training_metrics.accuracy,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✅ Ticket classifier trained"
        );

        Ok(TrainingReport {
            sample_count: artifact.training_sample_count,
            class_count: artifact.label_set.len(),
            class_labels: artifact.label_set.clone(),
            storage_location: self.model_store.storage_location(),
            vocabulary_size: artifact.vocabulary_size(),
            training_metrics: artifact.training_metrics.clone(),
            trained_at: artifact.trained_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ticket;
    use crate::state::{InMemoryTicketStore, TicketStore};
    use tempfile::TempDir;

    async fn trainer_for(tickets: Vec<Ticket>, dir: &TempDir) -> (Trainer, Arc<ModelStore>) {
        let store = Arc::new(InMemoryTicketStore::new());
        for ticket in &tickets {
            store.save_ticket(ticket).await.unwrap();
        }
        let config = MLConfig::default();
        let model_store = Arc::new(ModelStore::new(dir.path().join("model.bin")));
        let extractor = CorpusExtractor::new(
            store,
            config.min_examples,
            config.min_distinct_labels,
        );
        (Trainer::new(extractor, model_store.clone(), config), model_store)
    }

    #[tokio::test]
    async fn test_train_reports_sorted_labels() {
        let dir = TempDir::new().unwrap();
        let (trainer, model_store) = trainer_for(
            vec![
                Ticket::new(1, "Crash when saving", "").with_category("bug"),
                Ticket::new(2, "Cannot pay invoice", "").with_category("billing"),
                Ticket::new(3, "Dark mode please", "").with_category("feature"),
            ],
            &dir,
        )
        .await;

        let report = trainer.train().await.unwrap();

        assert_eq!(report.sample_count, 3);
        assert_eq!(report.class_count, 3);
        assert_eq!(report.class_labels, vec!["billing", "bug", "feature"]);
        assert_eq!(report.storage_location, model_store.storage_location());
        assert!(report.vocabulary_size > 0);

        let cached = model_store.cached().unwrap();
        assert_eq!(cached.artifact.source_record_ids, vec![1, 2, 3]);
        assert_eq!(cached.artifact.trained_corpus_vectors.nrows(), 3);
    }

    #[tokio::test]
    async fn test_train_with_one_label_leaves_store_empty() {
        let dir = TempDir::new().unwrap();
        let (trainer, model_store) = trainer_for(
            vec![
                Ticket::new(1, "Crash when saving", "").with_category("bug"),
                Ticket::new(2, "Crash on login", "").with_category("bug"),
            ],
            &dir,
        )
        .await;

        assert!(matches!(
            trainer.train().await,
            Err(AppError::InsufficientData(_))
        ));
        assert!(model_store.cached().is_none());
        assert!(!model_store.path().exists());
    }

    #[tokio::test]
    async fn test_retrain_replaces_model() {
        let dir = TempDir::new().unwrap();
        let (trainer, model_store) = trainer_for(
            vec![
                Ticket::new(1, "Crash when saving", "").with_category("bug"),
                Ticket::new(2, "Cannot pay invoice", "").with_category("billing"),
            ],
            &dir,
        )
        .await;

        trainer.train().await.unwrap();
        let first = model_store.cached().unwrap();
        trainer.train().await.unwrap();
        let second = model_store.cached().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.artifact.label_set, second.artifact.label_set);
    }
}
