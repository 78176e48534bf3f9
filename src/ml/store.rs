use crate::error::{AppError, Result};
use crate::ml::artifact::ModelArtifact;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// How the cached artifact got into memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelOrigin {
    /// Written by `save` in this process
    Saved,
    /// Read back from durable storage
    Loaded,
}

/// Cached artifact plus its freshness marker
#[derive(Debug)]
pub struct CachedModel {
    pub artifact: Arc<ModelArtifact>,

    /// When the artifact entered the cache
    pub cached_at: DateTime<Utc>,

    pub origin: ModelOrigin,
}

impl CachedModel {
    fn new(artifact: ModelArtifact, origin: ModelOrigin) -> Arc<Self> {
        Arc::new(Self {
            artifact: Arc::new(artifact),
            cached_at: Utc::now(),
            origin,
        })
    }
}

/// Durable model file plus the in-process cache in front of it
///
/// The cache slot is a single `Arc` behind a lock that is only held to
/// clone or replace the pointer. Readers therefore see one complete
/// artifact or another, never a mix, and disk I/O never happens under the
/// lock. Each process keeps its own slot; call [`ModelStore::invalidate`]
/// to pick up a model written by another process.
pub struct ModelStore {
    path: PathBuf,
    slot: RwLock<Option<Arc<CachedModel>>>,
}

impl ModelStore {
    /// Create a store for a fixed artifact path. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            slot: RwLock::new(None),
        }
    }

    /// Return the cached model, reading it from disk on a miss.
    ///
    /// A missing file is `ModelNotTrained`; an unreadable or incompatible
    /// file is `Persistence`. Either way the cache stays empty.
    pub fn load(&self) -> Result<Arc<CachedModel>> {
        if let Some(cached) = self.cached() {
            debug!("Model cache hit");
            return Ok(cached);
        }

        let artifact = self.read_artifact()?;
        let fresh = CachedModel::new(artifact, ModelOrigin::Loaded);

        let mut slot = self.slot.write();
        // A concurrent save or load may have filled the slot meanwhile;
        // that value is at least as new as what was just read
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        *slot = Some(fresh.clone());
        drop(slot);

        info!(
            path = %self.path.display(),
            samples = fresh.artifact.training_sample_count,
            labels = ?fresh.artifact.label_set,
            "Model loaded from storage"
        );

        Ok(fresh)
    }

    /// Overwrite the artifact on disk, then swap it into the cache.
    ///
    /// On a write failure the previous file and cache entry stay as they
    /// were.
    pub fn save(&self, artifact: ModelArtifact) -> Result<Arc<CachedModel>> {
        artifact.validate()?;
        self.write_artifact(&artifact)?;

        let fresh = CachedModel::new(artifact, ModelOrigin::Saved);
        *self.slot.write() = Some(fresh.clone());

        info!(path = %self.path.display(), "Model saved");
        Ok(fresh)
    }

    /// Drop the cached model; the next `load` reads from disk
    pub fn invalidate(&self) {
        if self.slot.write().take().is_some() {
            debug!("Model cache invalidated");
        }
    }

    /// Currently cached model, without touching disk
    pub fn cached(&self) -> Option<Arc<CachedModel>> {
        self.slot.read().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Human-readable artifact location
    pub fn storage_location(&self) -> String {
        self.path.display().to_string()
    }

    fn read_artifact(&self) -> Result<ModelArtifact> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::ModelNotTrained),
            Err(e) => {
                return Err(AppError::Persistence(format!(
                    "Failed to open {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        ModelArtifact::read_from(BufReader::new(file)).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Model artifact rejected");
            e
        })
    }

    /// Write to a uniquely named sibling temp file and rename it over the
    /// target, so a crash mid-write never leaves a truncated artifact and
    /// concurrent saves never share a scratch file
    fn write_artifact(&self, artifact: &ModelArtifact) -> Result<()> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Persistence(format!(
                        "Failed to create model directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                parent
            }
            None => Path::new("."),
        };

        // Dropping the handle on any early return removes the temp file
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| {
            AppError::Persistence(format!(
                "Failed to create temp file in {}: {}",
                parent.display(),
                e
            ))
        })?;

        let mut writer = BufWriter::new(tmp.as_file_mut());
        artifact.write_to(&mut writer)?;
        writer
            .into_inner()
            .map_err(|e| AppError::Persistence(format!("Failed to flush model file: {}", e)))?
            .sync_all()
            .map_err(|e| AppError::Persistence(format!("Failed to sync model file: {}", e)))?;

        tmp.persist(&self.path).map_err(|e| {
            AppError::Persistence(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        Ok(())
    }
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("path", &self.path)
            .field("cached", &self.slot.read().is_some())
            .finish()
    }
}
