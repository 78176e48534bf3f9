use crate::error::{AppError, Result};
use crate::models::{Ticket, TicketId};
use crate::state::TicketStore;
use async_trait::async_trait;
use sled::Db;
use std::cmp::max;
use std::path::Path;
use std::sync::Arc;

/// Persistent ticket store using Sled embedded database
#[derive(Clone)]
pub struct SledTicketStore {
    db: Arc<Db>,
    tickets_tree: sled::Tree,
    meta_tree: sled::Tree,
}

/// Highest ticket id handed out or saved so far
const LAST_ID_KEY: &[u8] = b"last_ticket_id";

impl SledTicketStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let tickets_tree = db.open_tree("tickets").map_err(|e| {
            AppError::Database(format!("Failed to open tickets tree: {}", e))
        })?;

        let meta_tree = db.open_tree("meta").map_err(|e| {
            AppError::Database(format!("Failed to open meta tree: {}", e))
        })?;

        tracing::info!("Initialized Sled ticket store at {:?}", path_ref);

        Ok(Self {
            db: Arc::new(db),
            tickets_tree,
            meta_tree,
        })
    }

    /// Serialize ticket to bytes
    fn serialize_ticket(ticket: &Ticket) -> Result<Vec<u8>> {
        bincode::serialize(ticket)
            .map_err(|e| AppError::Serialization(format!("Failed to serialize ticket: {}", e)))
    }

    /// Deserialize ticket from bytes
    fn deserialize_ticket(bytes: &[u8]) -> Result<Ticket> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Serialization(format!("Failed to deserialize ticket: {}", e)))
    }

    /// Big-endian so that tree iteration order is ascending id
    fn ticket_key(id: TicketId) -> [u8; 8] {
        id.to_be_bytes()
    }

    fn decode_id(bytes: &[u8]) -> Option<TicketId> {
        bytes.try_into().ok().map(u64::from_be_bytes)
    }

    /// Raise the stored high-water mark to at least `id`
    fn record_id(&self, id: TicketId) -> Result<()> {
        self.meta_tree
            .fetch_and_update(LAST_ID_KEY, |old| {
                let last = old.and_then(Self::decode_id).unwrap_or(0);
                Some(max(last, id).to_be_bytes().to_vec())
            })
            .map_err(|e| AppError::Database(format!("Failed to record ticket id: {}", e)))?;
        Ok(())
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| AppError::Database(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

}

#[async_trait]
impl TicketStore for SledTicketStore {
    async fn next_ticket_id(&self) -> Result<TicketId> {
        // Databases written before the counter existed only have the keys
        let floor = match self.tickets_tree.last()? {
            Some((key, _)) => Self::decode_id(&key)
                .ok_or_else(|| AppError::Database("Malformed ticket key".to_string()))?,
            None => 0,
        };

        let next = self
            .meta_tree
            .update_and_fetch(LAST_ID_KEY, |old| {
                let last = old.and_then(Self::decode_id).unwrap_or(0);
                Some((max(last, floor) + 1).to_be_bytes().to_vec())
            })
            .map_err(|e| AppError::Database(format!("Failed to allocate ticket id: {}", e)))?;

        next.as_deref()
            .and_then(Self::decode_id)
            .ok_or_else(|| AppError::Database("Ticket id counter is missing".to_string()))
    }

    async fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        let value = Self::serialize_ticket(ticket)?;

        self.tickets_tree
            .insert(Self::ticket_key(ticket.id), value)
            .map_err(|e| AppError::Database(format!("Failed to save ticket: {}", e)))?;
        self.record_id(ticket.id)?;

        // Flush to ensure durability
        self.tickets_tree
            .flush()
            .map_err(|e| AppError::Database(format!("Failed to flush tickets tree: {}", e)))?;

        tracing::debug!(ticket_id = ticket.id, "Ticket saved to Sled");
        Ok(())
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        match self.tickets_tree.get(Self::ticket_key(id)) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_ticket(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Database(format!("Failed to get ticket: {}", e))),
        }
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        let key = Self::ticket_key(ticket.id);

        if !self.tickets_tree.contains_key(key).map_err(|e| {
            AppError::Database(format!("Failed to check ticket existence: {}", e))
        })? {
            return Err(AppError::NotFound(format!("Ticket {} not found", ticket.id)));
        }

        self.save_ticket(ticket).await
    }

    async fn delete_ticket(&self, id: TicketId) -> Result<()> {
        let removed = self
            .tickets_tree
            .remove(Self::ticket_key(id))
            .map_err(|e| AppError::Database(format!("Failed to delete ticket: {}", e)))?;

        if removed.is_none() {
            return Err(AppError::NotFound(format!("Ticket {} not found", id)));
        }

        self.tickets_tree
            .flush()
            .map_err(|e| AppError::Database(format!("Failed to flush tickets tree: {}", e)))?;

        tracing::debug!(ticket_id = id, "Ticket deleted from Sled");
        Ok(())
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        self.tickets_tree
            .iter()
            .map(|result| {
                let (_, value) = result.map_err(|e| {
                    AppError::Database(format!("Failed to iterate tickets: {}", e))
                })?;
                Self::deserialize_ticket(&value)
            })
            .collect()
    }

    async fn count_tickets(&self) -> Result<u64> {
        Ok(self.tickets_tree.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sled_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledTicketStore::new(temp_dir.path()).unwrap();

        let id = store.next_ticket_id().await.unwrap();
        let ticket = Ticket::new(id, "App crashes", "On login").with_category("bug");
        store.save_ticket(&ticket).await.unwrap();

        assert_eq!(store.get_ticket(id).await.unwrap(), Some(ticket));
        assert_eq!(store.count_tickets().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sled_iterates_in_id_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledTicketStore::new(temp_dir.path()).unwrap();

        for id in [300, 2, 40] {
            store.save_ticket(&Ticket::new(id, "t", "d")).await.unwrap();
        }

        let ids: Vec<TicketId> = store
            .list_tickets()
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![2, 40, 300]);
        assert!(store.next_ticket_id().await.unwrap() > 300);
    }

    #[tokio::test]
    async fn test_large_explicit_id_allocates_in_one_step() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledTicketStore::new(temp_dir.path()).unwrap();

        let imported: TicketId = 5_000_000_000;
        store
            .save_ticket(&Ticket::new(imported, "Imported", "From another tracker"))
            .await
            .unwrap();

        let first = store.next_ticket_id().await.unwrap();
        let second = store.next_ticket_id().await.unwrap();
        assert_eq!(first, imported + 1);
        assert_eq!(second, imported + 2);
    }

    #[tokio::test]
    async fn test_allocated_ids_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let first = {
            let store = SledTicketStore::new(temp_dir.path()).unwrap();
            let id = store.next_ticket_id().await.unwrap();
            store.flush().await.unwrap();
            id
        };

        // Never saved, but still never handed out twice
        let store = SledTicketStore::new(temp_dir.path()).unwrap();
        assert!(store.next_ticket_id().await.unwrap() > first);
    }

    #[tokio::test]
    async fn test_sled_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = SledTicketStore::new(temp_dir.path()).unwrap();
            store
                .save_ticket(&Ticket::new(1, "Invoice", "Missing").with_category("billing"))
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let store = SledTicketStore::new(temp_dir.path()).unwrap();
        let labeled = store.list_labeled_tickets().await.unwrap();
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].label(), Some("billing"));
    }
}
