use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Too few labeled examples or distinct classes to train meaningfully
    #[error("Insufficient training data: {0}")]
    InsufficientData(String),

    /// Predict or similarity requested before any model exists
    #[error("Model not trained: no artifact in cache or storage")]
    ModelNotTrained,

    /// Durable artifact read/write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Model fitting failure
    #[error("Training error: {0}")]
    Training(String),

    /// Record store errors
    #[error("Database error: {0}")]
    Database(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::InsufficientData(_) => "INSUFFICIENT_DATA",
            AppError::ModelNotTrained => "MODEL_NOT_TRAINED",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller, not the engine, is at fault.
    ///
    /// Transports map these to "precondition not met" or "unprocessable
    /// input" style responses; everything else is a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InsufficientData(_)
                | AppError::ModelNotTrained
                | AppError::NotFound(_)
                | AppError::Validation(_)
        )
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Conversion from sled::Error
impl From<sled::Error> for AppError {
    fn from(err: sled::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::ModelNotTrained.error_code(), "MODEL_NOT_TRAINED");
        assert_eq!(
            AppError::InsufficientData("one class".to_string()).error_code(),
            "INSUFFICIENT_DATA"
        );
        assert_eq!(
            AppError::Persistence("disk full".to_string()).error_code(),
            "PERSISTENCE_ERROR"
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(AppError::ModelNotTrained.is_client_error());
        assert!(AppError::InsufficientData("x".to_string()).is_client_error());
        assert!(!AppError::Persistence("x".to_string()).is_client_error());
        assert!(!AppError::Internal("x".to_string()).is_client_error());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::InsufficientData("only 1 distinct label".to_string());
        assert_eq!(
            err.to_string(),
            "Insufficient training data: only 1 distinct label"
        );
    }
}
