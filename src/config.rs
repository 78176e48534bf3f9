use crate::error::{AppError, Result};
use crate::ml::MLConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Engine configuration
    #[serde(default)]
    pub ml: MLConfig,

    /// Ticket store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path = std::env::var("TICKET_INTEL_CONFIG")
            .unwrap_or_else(|_| "config/local.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: TICKET_INTEL_)
            .add_source(
                config::Environment::with_prefix("TICKET_INTEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let ml = &self.ml;

        if ml.min_distinct_labels < 2 {
            return Err(AppError::Configuration(
                "ml.min_distinct_labels must be at least 2".to_string(),
            ));
        }
        if ml.min_examples < ml.min_distinct_labels {
            return Err(AppError::Configuration(format!(
                "ml.min_examples ({}) must be >= ml.min_distinct_labels ({})",
                ml.min_examples, ml.min_distinct_labels
            )));
        }
        if ml.max_top_k == 0 || ml.default_top_k == 0 || ml.default_top_k > ml.max_top_k {
            return Err(AppError::Configuration(format!(
                "ml.default_top_k ({}) must be in [1, ml.max_top_k ({})]",
                ml.default_top_k, ml.max_top_k
            )));
        }

        let (min_n, max_n) = ml.vectorizer.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(AppError::Configuration(format!(
                "ml.vectorizer.ngram_range ({}, {}) is invalid",
                min_n, max_n
            )));
        }
        if ml.vectorizer.min_doc_freq == 0 {
            return Err(AppError::Configuration(
                "ml.vectorizer.min_doc_freq must be at least 1".to_string(),
            ));
        }

        if ml.classifier.alpha.is_nan() || ml.classifier.alpha < 0.0 || ml.classifier.max_iterations == 0 {
            return Err(AppError::Configuration(
                "ml.classifier requires alpha >= 0 and max_iterations > 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Sled && self.store.path.is_none() {
            return Err(AppError::Configuration(
                "store.path is required for the sled backend".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Ticket store backend
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path for the embedded database
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: Some(PathBuf::from("./data/tickets")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "ticket_intel=info".to_string()
}
