use crate::error::{AppError, Result};
use crate::ml::models::{Corpus, TrainingExample};
use crate::state::TicketStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Builds the training corpus from labeled tickets
pub struct CorpusExtractor {
    store: Arc<dyn TicketStore>,
    min_examples: usize,
    min_distinct_labels: usize,
}

impl CorpusExtractor {
    pub fn new(store: Arc<dyn TicketStore>, min_examples: usize, min_distinct_labels: usize) -> Self {
        Self {
            store,
            min_examples,
            min_distinct_labels,
        }
    }

    /// Collect every labeled ticket, ascending id.
    ///
    /// Fails with `InsufficientData` when the result is too small or too
    /// homogeneous to train on.
    pub async fn extract(&self) -> Result<Corpus> {
        let mut tickets = self.store.list_labeled_tickets().await?;
        // Stores promise ascending ids; alignment of rows and ids depends on it
        tickets.sort_by_key(|ticket| ticket.id);

        let mut corpus = Corpus::default();
        for ticket in &tickets {
            if let Some(label) = ticket.label() {
                corpus.examples.push(TrainingExample::new(ticket.text(), label));
                corpus.record_ids.push(ticket.id);
            }
        }

        let distinct: BTreeSet<&str> = corpus.examples.iter().map(|e| e.label.as_str()).collect();

        if corpus.len() < self.min_examples {
            return Err(AppError::InsufficientData(format!(
                "{} labeled tickets found, at least {} required",
                corpus.len(),
                self.min_examples
            )));
        }
        if distinct.len() < self.min_distinct_labels {
            return Err(AppError::InsufficientData(format!(
                "{} distinct categories found, at least {} required",
                distinct.len(),
                self.min_distinct_labels
            )));
        }

        tracing::debug!(
            examples = corpus.len(),
            distinct_labels = distinct.len(),
            "Corpus extracted"
        );

        Ok(corpus)
    }
}
