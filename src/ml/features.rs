use crate::error::{AppError, Result};
use crate::ml::models::{Analyzer, VectorizerConfig};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// TF-IDF text vectorizer
///
/// Fit once on the training corpus; afterwards every text maps to a vector
/// of `n_features()` dimensions, L2-normalized (all zeros when none of its
/// terms are in the vocabulary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Configuration
    config: VectorizerConfig,

    /// Vocabulary mapping (term -> index); indices follow term order
    vocabulary: BTreeMap<String, usize>,

    /// Inverse document frequency, indexed like the vocabulary
    idf: Vec<f64>,

    /// Number of documents seen during fit
    n_documents: usize,

    /// Is fitted (vocabulary built)
    is_fitted: bool,
}

impl TfidfVectorizer {
    /// Create a new, unfitted vectorizer
    pub fn new(config: VectorizerConfig) -> Self {
        Self {
            config,
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
            n_documents: 0,
            is_fitted: false,
        }
    }

    /// Learn the vocabulary and IDF weights from a corpus
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        let (min_n, max_n) = self.config.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(AppError::Configuration(format!(
                "ngram_range ({}, {}) must satisfy 1 <= min <= max",
                min_n, max_n
            )));
        }

        if documents.is_empty() {
            return Err(AppError::InsufficientData(
                "cannot fit vectorizer on an empty corpus".to_string(),
            ));
        }

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let terms = self.extract_terms(doc.as_ref());
            let mut seen = HashSet::new();
            for term in terms {
                *total_freq.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.clone()) {
                    *doc_freq.entry(term).or_insert(0) += 1;
                }
            }
        }

        // Filter vocabulary by document frequency
        let min_df = self.config.min_doc_freq;
        let mut kept: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= min_df)
            .collect();

        // Limit vocabulary size, most frequent first
        if let Some(max_features) = self.config.max_features {
            kept.sort_by(|a, b| {
                total_freq[&b.0]
                    .cmp(&total_freq[&a.0])
                    .then_with(|| a.0.cmp(&b.0))
            });
            kept.truncate(max_features);
        }

        if kept.is_empty() {
            return Err(AppError::InsufficientData(
                "no terms survive vocabulary filtering".to_string(),
            ));
        }

        let by_term: BTreeMap<String, usize> = kept.into_iter().collect();
        let n_docs = documents.len() as f64;

        // Smoothed IDF: ln((1 + n) / (1 + df)) + 1
        self.idf = by_term
            .values()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();
        self.vocabulary = by_term
            .into_keys()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect();
        self.n_documents = documents.len();
        self.is_fitted = true;

        tracing::debug!(
            n_documents = self.n_documents,
            vocabulary_size = self.vocabulary.len(),
            "Vectorizer fitted"
        );

        Ok(())
    }

    /// Transform a single text into a TF-IDF vector
    pub fn transform(&self, text: &str) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(AppError::Internal(
                "TfidfVectorizer must be fitted before transform".to_string(),
            ));
        }

        let mut vector = Array1::zeros(self.vocabulary.len());

        for (term, count) in Self::count_terms(self.extract_terms(text)) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                let tf = if self.config.sublinear_tf {
                    1.0 + (count as f64).ln()
                } else {
                    count as f64
                };
                vector[idx] = tf * self.idf[idx];
            }
        }

        let norm = vector.dot(&vector).sqrt();
        if norm > 0.0 {
            vector /= norm;
        }

        Ok(vector)
    }

    /// Transform many texts into a (documents x features) matrix
    pub fn transform_batch<S: AsRef<str>>(&self, documents: &[S]) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((documents.len(), self.n_features()));
        for (row, doc) in documents.iter().enumerate() {
            matrix.row_mut(row).assign(&self.transform(doc.as_ref())?);
        }
        Ok(matrix)
    }

    /// Fit and transform in one step
    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform_batch(documents)
    }

    /// Split text into terms according to the analyzer
    fn extract_terms(&self, text: &str) -> Vec<String> {
        let text = if self.config.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        // A zero-length n-gram is never a term
        let (min_n, max_n) = self.config.ngram_range;
        let min_n = min_n.max(1);

        match self.config.analyzer {
            Analyzer::Word => {
                // Tokens of two or more word characters
                let words: Vec<&str> = text
                    .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .filter(|w| w.chars().count() >= 2)
                    .collect();

                let mut terms = Vec::new();
                for n in min_n..=max_n {
                    for window in words.windows(n) {
                        terms.push(window.join(" "));
                    }
                }
                terms
            }
            Analyzer::CharWb => {
                let mut terms = Vec::new();
                for word in text.split_whitespace() {
                    let padded: Vec<char> = std::iter::once(' ')
                        .chain(word.chars())
                        .chain(std::iter::once(' '))
                        .collect();

                    for n in min_n..=max_n {
                        if padded.len() <= n {
                            // Short words contribute themselves once, and
                            // longer n-grams of them add nothing new
                            terms.push(padded.iter().collect());
                            break;
                        }
                        for window in padded.windows(n) {
                            terms.push(window.iter().collect());
                        }
                    }
                }
                terms
            }
        }
    }

    /// Count term occurrences
    fn count_terms(terms: Vec<String>) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for term in terms {
            *counts.entry(term).or_insert(0) += 1;
        }
        counts
    }

    /// Get number of features
    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Check if fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Look up the column of a term
    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }
}
