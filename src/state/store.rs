use crate::error::{AppError, Result};
use crate::models::{Ticket, TicketId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for ticket storage operations
///
/// The engine only relies on [`TicketStore::list_labeled_tickets`] and
/// [`TicketStore::get_ticket`]; the rest exists so callers can seed and
/// maintain the records it learns from.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Reserve a fresh ticket id
    async fn next_ticket_id(&self) -> Result<TicketId>;

    /// Save a ticket (insert or overwrite)
    async fn save_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// Get a ticket by ID
    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>>;

    /// Update an existing ticket
    async fn update_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// Delete a ticket
    async fn delete_ticket(&self, id: TicketId) -> Result<()>;

    /// All tickets, ascending id
    async fn list_tickets(&self) -> Result<Vec<Ticket>>;

    /// Tickets with a non-blank category, ascending id
    async fn list_labeled_tickets(&self) -> Result<Vec<Ticket>> {
        Ok(self
            .list_tickets()
            .await?
            .into_iter()
            .filter(|ticket| ticket.label().is_some())
            .collect())
    }

    /// Count stored tickets
    async fn count_tickets(&self) -> Result<u64>;
}

/// In-memory ticket store (for development and testing)
#[derive(Clone)]
pub struct InMemoryTicketStore {
    tickets: Arc<DashMap<TicketId, Ticket>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn next_ticket_id(&self) -> Result<TicketId> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.tickets.insert(ticket.id, ticket.clone());
        // Keep generated ids ahead of explicitly chosen ones
        self.next_id.fetch_max(ticket.id + 1, Ordering::SeqCst);

        tracing::debug!(ticket_id = ticket.id, "Ticket saved");
        Ok(())
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        Ok(self.tickets.get(&id).map(|entry| entry.clone()))
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        if self.tickets.contains_key(&ticket.id) {
            self.tickets.insert(ticket.id, ticket.clone());
            tracing::debug!(ticket_id = ticket.id, "Ticket updated");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Ticket {} not found", ticket.id)))
        }
    }

    async fn delete_ticket(&self, id: TicketId) -> Result<()> {
        if self.tickets.remove(&id).is_some() {
            tracing::debug!(ticket_id = id, "Ticket deleted");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Ticket {} not found", id)))
        }
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tickets.sort_by_key(|ticket| ticket.id);
        Ok(tickets)
    }

    async fn count_tickets(&self) -> Result<u64> {
        Ok(self.tickets.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_get_ticket() {
        let store = InMemoryTicketStore::new();
        let id = store.next_ticket_id().await.unwrap();

        let ticket = Ticket::new(id, "Billing issue", "Card not working").with_category("billing");
        store.save_ticket(&ticket).await.unwrap();

        let retrieved = store.get_ticket(id).await.unwrap();
        assert_eq!(retrieved, Some(ticket));
    }

    #[tokio::test]
    async fn test_update_missing_ticket_fails() {
        let store = InMemoryTicketStore::new();
        let ticket = Ticket::new(42, "Ghost", "Never saved");

        let result = store.update_ticket(&ticket).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_id() {
        let store = InMemoryTicketStore::new();
        for id in [5, 2, 9, 1] {
            store.save_ticket(&Ticket::new(id, "t", "d")).await.unwrap();
        }

        let ids: Vec<TicketId> = store
            .list_tickets()
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 5, 9]);

        // Generated ids continue past the largest explicit id
        assert_eq!(store.next_ticket_id().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_list_labeled_skips_blank_categories() {
        let store = InMemoryTicketStore::new();
        store
            .save_ticket(&Ticket::new(1, "a", "b").with_category("bug"))
            .await
            .unwrap();
        store
            .save_ticket(&Ticket::new(2, "a", "b").with_category(""))
            .await
            .unwrap();
        store.save_ticket(&Ticket::new(3, "a", "b")).await.unwrap();

        let labeled = store.list_labeled_tickets().await.unwrap();
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].id, 1);
        assert_eq!(store.count_tickets().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_ticket() {
        let store = InMemoryTicketStore::new();
        store.save_ticket(&Ticket::new(1, "a", "b")).await.unwrap();

        store.delete_ticket(1).await.unwrap();
        assert!(store.get_ticket(1).await.unwrap().is_none());
        assert!(store.delete_ticket(1).await.is_err());
    }
}
