use crate::error::Result;
use crate::ml::models::SimilarityHit;
use crate::ml::store::ModelStore;
use ndarray::ArrayView1;
use std::cmp::Ordering;
use std::sync::Arc;

/// Cosine of the angle between two vectors; 0.0 when either has zero norm
pub fn cosine_similarity(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (a.dot(&b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Nearest-neighbor lookup over the vectors stored with the model
pub struct SimilarityEngine {
    model_store: Arc<ModelStore>,
    max_top_k: usize,
}

impl SimilarityEngine {
    pub fn new(model_store: Arc<ModelStore>, max_top_k: usize) -> Self {
        Self {
            model_store,
            max_top_k: max_top_k.max(1),
        }
    }

    /// Rank trained tickets by similarity to `text`.
    ///
    /// `top_k` is clamped to `1..=max_top_k` and then to the corpus size.
    /// Equal scores keep ascending ticket id. The query's own ticket is
    /// not filtered out.
    pub fn find_similar(&self, text: &str, top_k: usize) -> Result<Vec<SimilarityHit>> {
        let mut hits = self.rank(text)?;

        let k = top_k.clamp(1, self.max_top_k).min(hits.len());
        hits.truncate(k);

        tracing::debug!(requested = top_k, returned = hits.len(), "Similarity query");

        Ok(hits)
    }

    /// Every trained ticket scored against `text`, best first
    pub(crate) fn rank(&self, text: &str) -> Result<Vec<SimilarityHit>> {
        let cached = self.model_store.load()?;
        let artifact = &cached.artifact;

        let query = artifact.vectorizer.transform(text)?;

        let mut hits: Vec<SimilarityHit> = artifact
            .trained_corpus_vectors
            .rows()
            .into_iter()
            .zip(artifact.source_record_ids.iter())
            .map(|(row, &record_id)| SimilarityHit {
                record_id,
                score: cosine_similarity(query.view(), row),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });

        Ok(hits)
    }
}
