use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, LogisticRegressionClassifier};
use crate::ml::features::TfidfVectorizer;
use crate::ml::models::ModelMetrics;
use crate::models::TicketId;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// File magic identifying a ticket model artifact
pub const ARTIFACT_MAGIC: [u8; 4] = *b"TKTI";

/// Bumped whenever the serialized layout of [`ModelArtifact`] changes
pub const ARTIFACT_SCHEMA_VERSION: u32 = 2;

/// Fixed-size prefix written before the artifact body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub magic: [u8; 4],
    pub schema_version: u32,
}

impl ArtifactHeader {
    pub fn current() -> Self {
        Self {
            magic: ARTIFACT_MAGIC,
            schema_version: ARTIFACT_SCHEMA_VERSION,
        }
    }
}

/// Everything needed to classify and rank tickets without the corpus
#[derive(Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Fitted text vectorizer
    pub vectorizer: TfidfVectorizer,

    /// Fitted classifier; class `i` is `label_set[i]`
    pub classifier: LogisticRegressionClassifier,

    /// Categories, sorted ascending
    pub label_set: Vec<String>,

    /// Number of training examples
    pub training_sample_count: usize,

    /// Vectorized corpus, one row per training example
    pub trained_corpus_vectors: Array2<f64>,

    /// Ticket id of each row of `trained_corpus_vectors`
    pub source_record_ids: Vec<TicketId>,

    /// Metrics on the training set
    pub training_metrics: ModelMetrics,

    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    /// Check structural invariants
    pub fn validate(&self) -> Result<()> {
        if self.label_set.len() < 2 {
            return Err(AppError::Persistence(format!(
                "artifact has {} labels, at least 2 required",
                self.label_set.len()
            )));
        }
        if self.label_set.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(AppError::Persistence(
                "artifact label set is not sorted and distinct".to_string(),
            ));
        }

        let rows = self.trained_corpus_vectors.nrows();
        if rows != self.training_sample_count || rows != self.source_record_ids.len() {
            return Err(AppError::Persistence(format!(
                "artifact shape mismatch: {} vector rows, {} samples, {} record ids",
                rows,
                self.training_sample_count,
                self.source_record_ids.len()
            )));
        }

        let n_features = self.vectorizer.n_features();
        if self.trained_corpus_vectors.ncols() != n_features
            || self.classifier.n_features() != n_features
        {
            return Err(AppError::Persistence(format!(
                "artifact feature mismatch: vectorizer {}, corpus {}, classifier {}",
                n_features,
                self.trained_corpus_vectors.ncols(),
                self.classifier.n_features()
            )));
        }

        if self.classifier.n_classes() != self.label_set.len() {
            return Err(AppError::Persistence(format!(
                "classifier separates {} classes but the label set has {}",
                self.classifier.n_classes(),
                self.label_set.len()
            )));
        }

        Ok(())
    }

    /// Write header and body
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        bincode::serialize_into(&mut writer, &ArtifactHeader::current())
            .map_err(|e| AppError::Persistence(format!("Failed to write artifact header: {}", e)))?;
        bincode::serialize_into(&mut writer, self)
            .map_err(|e| AppError::Persistence(format!("Failed to write artifact: {}", e)))?;
        writer
            .flush()
            .map_err(|e| AppError::Persistence(format!("Failed to flush artifact: {}", e)))?;
        Ok(())
    }

    /// Read an artifact, rejecting foreign files and other schema versions
    /// before touching the body
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let header: ArtifactHeader = bincode::deserialize_from(&mut reader).map_err(|e| {
            AppError::Persistence(format!("Not a ticket model artifact: {}", e))
        })?;

        if header.magic != ARTIFACT_MAGIC {
            return Err(AppError::Persistence(
                "Not a ticket model artifact: bad magic".to_string(),
            ));
        }
        if header.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(AppError::Persistence(format!(
                "Incompatible artifact schema: expected version {}, found {}",
                ARTIFACT_SCHEMA_VERSION, header.schema_version
            )));
        }

        let artifact: ModelArtifact = bincode::deserialize_from(&mut reader)
            .map_err(|e| AppError::Persistence(format!("Corrupt artifact body: {}", e)))?;
        artifact.validate()?;

        Ok(artifact)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.vocab_size()
    }
}

impl std::fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("label_set", &self.label_set)
            .field("training_sample_count", &self.training_sample_count)
            .field("vocabulary_size", &self.vocabulary_size())
            .field("trained_at", &self.trained_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ml::models::{ClassifierConfig, VectorizerConfig};

    /// Small two-class artifact built without a store
    pub(crate) fn sample_artifact() -> ModelArtifact {
        let texts = [
            "cannot pay invoice",
            "app crashes on login",
            "update billing address",
            "crash when saving",
        ];
        let labels = vec![0, 1, 0, 1];
        let label_set = vec!["billing".to_string(), "bug".to_string()];

        let mut vectorizer = TfidfVectorizer::new(VectorizerConfig::default());
        let vectors = vectorizer.fit_transform(&texts).unwrap();
        let mut classifier = LogisticRegressionClassifier::new(ClassifierConfig::default());
        classifier.train(&vectors, &labels).unwrap();

        ModelArtifact {
            vectorizer,
            classifier,
            label_set,
            training_sample_count: 4,
            trained_corpus_vectors: vectors,
            source_record_ids: vec![1, 2, 3, 4],
            training_metrics: ModelMetrics::default(),
            trained_at: Utc::now(),
        }
    }

    #[test]
    fn test_sample_artifact_is_valid() {
        assert!(sample_artifact().validate().is_ok());
    }

    #[test]
    fn test_write_then_read() {
        let artifact = sample_artifact();
        let mut buffer = Vec::new();
        artifact.write_to(&mut buffer).unwrap();

        let restored = ModelArtifact::read_from(buffer.as_slice()).unwrap();
        assert_eq!(restored.label_set, artifact.label_set);
        assert_eq!(restored.source_record_ids, artifact.source_record_ids);
        assert_eq!(restored.trained_corpus_vectors, artifact.trained_corpus_vectors);
    }

    #[test]
    fn test_schema_mismatch_fails_fast() {
        let artifact = sample_artifact();
        let mut buffer = Vec::new();
        bincode::serialize_into(
            &mut buffer,
            &ArtifactHeader {
                magic: ARTIFACT_MAGIC,
                schema_version: ARTIFACT_SCHEMA_VERSION + 1,
            },
        )
        .unwrap();
        bincode::serialize_into(&mut buffer, &artifact).unwrap();

        let err = ModelArtifact::read_from(buffer.as_slice()).unwrap_err();
        assert!(matches!(err, AppError::Persistence(ref msg) if msg.contains("schema")));
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let err = ModelArtifact::read_from(&b"definitely not a model"[..]).unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));

        let err = ModelArtifact::read_from(&b"ab"[..]).unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[test]
    fn test_validate_catches_shape_mismatch() {
        let mut artifact = sample_artifact();
        artifact.source_record_ids.pop();
        assert!(matches!(
            artifact.validate(),
            Err(AppError::Persistence(_))
        ));

        let mut artifact = sample_artifact();
        artifact.label_set = vec!["only".to_string()];
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_classifier_matches_label_set() {
        let artifact = sample_artifact();
        assert_eq!(artifact.classifier.n_classes(), artifact.label_set.len());
    }
}
