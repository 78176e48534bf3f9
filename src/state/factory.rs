use crate::config::{StoreBackend, StoreConfig};
use crate::error::{AppError, Result};
use crate::state::{InMemoryTicketStore, SledTicketStore, TicketStore};
use std::sync::Arc;

/// Create a ticket store based on configuration
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn TicketStore>> {
    match config.backend {
        StoreBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled ticket store");

            let store = SledTicketStore::new(path)?;
            Ok(Arc::new(store))
        }

        StoreBackend::Memory => Ok(create_in_memory_store()),
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn TicketStore> {
    tracing::info!("Initializing in-memory ticket store");
    Arc::new(InMemoryTicketStore::new())
}
