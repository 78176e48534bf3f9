use crate::error::{AppError, Result};
use crate::ml::corpus::CorpusExtractor;
use crate::ml::models::{MLConfig, ModelStats, Prediction, SimilarTicket, SimilarityHit, TrainingReport};
use crate::ml::predictor::Predictor;
use crate::ml::similarity::SimilarityEngine;
use crate::ml::store::ModelStore;
use crate::ml::trainer::Trainer;
use crate::models::{Ticket, TicketId};
use crate::state::TicketStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Ticket intelligence service
///
/// Owns the engine components and wires them to the ticket store. The
/// [`ModelStore`] is injected so that every service built in a process
/// shares one cache slot.
pub struct TicketIntelligence {
    /// Ticket store for corpus reads and category write-back
    store: Arc<dyn TicketStore>,

    /// Model persistence and cache
    model_store: Arc<ModelStore>,

    trainer: Trainer,
    predictor: Predictor,
    similarity: SimilarityEngine,

    config: MLConfig,
}

impl TicketIntelligence {
    pub fn new(store: Arc<dyn TicketStore>, model_store: Arc<ModelStore>, config: MLConfig) -> Self {
        let extractor = CorpusExtractor::new(
            store.clone(),
            config.min_examples,
            config.min_distinct_labels,
        );

        Self {
            trainer: Trainer::new(extractor, model_store.clone(), config.clone()),
            predictor: Predictor::new(model_store.clone()),
            similarity: SimilarityEngine::new(model_store.clone(), config.max_top_k),
            store,
            model_store,
            config,
        }
    }

    /// Retrain on every labeled ticket
    pub async fn train(&self) -> Result<TrainingReport> {
        info!("🧠 Training ticket classifier");
        self.trainer.train().await
    }

    /// Suggest a category for free text
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        self.predictor.predict(text)
    }

    /// Rank trained tickets by similarity to free text
    pub fn find_similar(&self, text: &str, top_k: Option<usize>) -> Result<Vec<SimilarityHit>> {
        self.similarity
            .find_similar(text, top_k.unwrap_or(self.config.default_top_k))
    }

    /// Suggest a category for a stored ticket
    pub async fn predict_for_ticket(&self, id: TicketId) -> Result<Prediction> {
        let ticket = self.require_ticket(id).await?;
        self.predict(&ticket.text())
    }

    /// Predict and store the label as the ticket's category
    pub async fn apply_prediction(&self, id: TicketId) -> Result<Prediction> {
        let mut ticket = self.require_ticket(id).await?;
        let prediction = self.predict(&ticket.text())?;

        ticket.set_category(prediction.label.clone());
        self.store.update_ticket(&ticket).await?;

        info!(ticket_id = id, category = %prediction.label, "Predicted category applied");
        Ok(prediction)
    }

    /// Tickets similar to a stored one, excluding the ticket itself
    pub async fn similar_to_ticket(
        &self,
        id: TicketId,
        top_k: Option<usize>,
    ) -> Result<Vec<SimilarTicket>> {
        let ticket = self.require_ticket(id).await?;
        let top_k = top_k
            .unwrap_or(self.config.default_top_k)
            .clamp(1, self.config.max_top_k);

        // Self is dropped before counting, so a trained ticket still gets top_k
        let hits = self.similarity.rank(&ticket.text())?;

        let mut similar = Vec::with_capacity(top_k);
        for hit in hits.into_iter().filter(|hit| hit.record_id != id) {
            if similar.len() == top_k {
                break;
            }
            // Tickets deleted since training are skipped
            match self.store.get_ticket(hit.record_id).await? {
                Some(found) => similar.push(SimilarTicket {
                    id: found.id,
                    title: found.title,
                    status: found.status,
                    category: found.category,
                    similarity: hit.score,
                }),
                None => debug!(ticket_id = hit.record_id, "Similar ticket no longer stored"),
            }
        }

        Ok(similar)
    }

    /// What the engine currently serves
    pub fn stats(&self) -> Result<ModelStats> {
        let storage_location = self.model_store.storage_location();

        let cached = match self.model_store.load() {
            Ok(cached) => cached,
            Err(AppError::ModelNotTrained) => {
                return Ok(ModelStats {
                    is_trained: false,
                    sample_count: 0,
                    class_labels: Vec::new(),
                    vocabulary_size: 0,
                    trained_at: None,
                    cached_at: None,
                    storage_location,
                })
            }
            Err(e) => return Err(e),
        };

        Ok(ModelStats {
            is_trained: true,
            sample_count: cached.artifact.training_sample_count,
            class_labels: cached.artifact.label_set.clone(),
            vocabulary_size: cached.artifact.vocabulary_size(),
            trained_at: Some(cached.artifact.trained_at),
            cached_at: Some(cached.cached_at),
            storage_location,
        })
    }

    /// Forget the cached model so the next call re-reads storage
    pub fn invalidate_model(&self) {
        self.model_store.invalidate();
    }

    pub fn model_store(&self) -> &Arc<ModelStore> {
        &self.model_store
    }

    async fn require_ticket(&self, id: TicketId) -> Result<Ticket> {
        self.store
            .get_ticket(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryTicketStore;
    use tempfile::TempDir;

    async fn service_with(tickets: Vec<Ticket>) -> (TicketIntelligence, Arc<InMemoryTicketStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryTicketStore::new());
        for ticket in &tickets {
            store.save_ticket(ticket).await.unwrap();
        }
        let model_store = Arc::new(ModelStore::new(dir.path().join("model.bin")));
        let service = TicketIntelligence::new(store.clone(), model_store, MLConfig::default());
        (service, store, dir)
    }

    fn labeled_tickets() -> Vec<Ticket> {
        vec![
            Ticket::new(1, "Cannot pay invoice", "").with_category("billing"),
            Ticket::new(2, "App crashes on login", "").with_category("bug"),
            Ticket::new(3, "Update billing address", "").with_category("billing"),
            Ticket::new(4, "Crash when saving", "").with_category("bug"),
        ]
    }

    #[tokio::test]
    async fn test_stats_before_and_after_training() {
        let (service, _store, _dir) = service_with(labeled_tickets()).await;

        let stats = service.stats().unwrap();
        assert!(!stats.is_trained);
        assert!(stats.trained_at.is_none());

        service.train().await.unwrap();

        let stats = service.stats().unwrap();
        assert!(stats.is_trained);
        assert_eq!(stats.sample_count, 4);
        assert_eq!(stats.class_labels, vec!["billing", "bug"]);
    }

    #[tokio::test]
    async fn test_apply_prediction_writes_category() {
        let mut tickets = labeled_tickets();
        tickets.push(Ticket::new(5, "Invoice payment failed", ""));
        let (service, store, _dir) = service_with(tickets).await;
        service.train().await.unwrap();

        let prediction = service.apply_prediction(5).await.unwrap();
        assert_eq!(prediction.label, "billing");

        let stored = store.get_ticket(5).await.unwrap().unwrap();
        assert_eq!(stored.category.as_deref(), Some("billing"));
    }

    #[tokio::test]
    async fn test_similar_to_ticket_excludes_itself() {
        let (service, _store, _dir) = service_with(labeled_tickets()).await;
        service.train().await.unwrap();

        let similar = service.similar_to_ticket(2, Some(2)).await.unwrap();
        assert_eq!(similar.len(), 2);
        assert!(similar.iter().all(|t| t.id != 2));
        assert_eq!(similar[0].id, 4);
        assert_eq!(similar[0].category.as_deref(), Some("bug"));
    }

    #[tokio::test]
    async fn test_similar_to_ticket_fills_max_top_k() {
        let (service, _store, _dir) = service_with(crate::seed::synthetic_tickets(1, 40)).await;
        service.train().await.unwrap();

        let max = service.config.max_top_k;
        let similar = service.similar_to_ticket(1, Some(max)).await.unwrap();
        assert_eq!(similar.len(), max);
        assert!(similar.iter().all(|t| t.id != 1));

        // Requests above the cap are clamped, not padded
        let similar = service.similar_to_ticket(1, Some(max + 5)).await.unwrap();
        assert_eq!(similar.len(), max);
    }

    #[tokio::test]
    async fn test_unknown_ticket_is_not_found() {
        let (service, _store, _dir) = service_with(labeled_tickets()).await;
        service.train().await.unwrap();

        assert!(matches!(
            service.predict_for_ticket(99).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.similar_to_ticket(99, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_predict_before_training_is_not_trained() {
        let (service, _store, _dir) = service_with(labeled_tickets()).await;

        assert!(matches!(
            service.predict_for_ticket(1).await,
            Err(AppError::ModelNotTrained)
        ));
        assert!(matches!(
            service.find_similar("crash", None),
            Err(AppError::ModelNotTrained)
        ));
    }
}
