use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier assigned to a ticket by the record store
pub type TicketId = u64;

/// A support ticket as held by the record store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Unique identifier
    pub id: TicketId,

    /// Short summary
    pub title: String,

    /// Free-text body
    pub description: String,

    /// Functional category (billing, bug, ...); `None` until labeled
    pub category: Option<String>,

    /// Workflow status
    pub status: TicketStatus,

    /// Business priority
    pub priority: TicketPriority,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a new open, unlabeled ticket
    pub fn new(id: TicketId, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            description: description.into(),
            category: None,
            status: TicketStatus::Open,
            priority: TicketPriority::Medium,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: TicketPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Category, if set to something other than blank
    pub fn label(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Text the engine sees for this ticket
    pub fn text(&self) -> String {
        build_text(&self.title, &self.description)
    }

    /// Overwrite the category (e.g. with a predicted one)
    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = Some(category.into());
        self.updated_at = Utc::now();
    }
}

/// Join title and description into a single document.
///
/// Both parts are trimmed; a blank part is dropped rather than leaving a
/// dangling separator.
pub fn build_text(title: &str, description: &str) -> String {
    let title = title.trim();
    let description = description.trim();
    match (title.is_empty(), description.is_empty()) {
        (false, false) => format!("{} {}", title, description),
        (false, true) => title.to_string(),
        _ => description.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}
