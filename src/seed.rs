//! Deterministic demo tickets for a sandbox store

use crate::models::{Ticket, TicketId, TicketPriority, TicketStatus};
use chrono::{Duration, Utc};

/// Categories the demo data is spread over, with sample titles for each
pub const SEED_CATEGORIES: [(&str, [&str; 3]); 5] = [
    (
        "billing",
        [
            "Invoice not received",
            "Payment failed on checkout",
            "Double charge on my credit card",
        ],
    ),
    (
        "account",
        [
            "Cannot reset password",
            "Account locked after login attempts",
            "Email change not working",
        ],
    ),
    (
        "bug",
        [
            "Error 500 on dashboard",
            "Mobile app crashes on startup",
            "Search returns no results",
        ],
    ),
    (
        "feature",
        [
            "Request for dark mode",
            "Add export to CSV option",
            "Support for SSO login",
        ],
    ),
    (
        "other",
        [
            "General question about pricing",
            "Feedback on user interface",
            "Issue not categorized",
        ],
    ),
];

const STATUSES: [TicketStatus; 4] = [
    TicketStatus::Open,
    TicketStatus::InProgress,
    TicketStatus::Resolved,
    TicketStatus::Closed,
];

const PRIORITIES: [TicketPriority; 3] = [
    TicketPriority::Low,
    TicketPriority::Medium,
    TicketPriority::High,
];

/// Build `n` labeled tickets with ids starting at `first_id`.
///
/// The same arguments always produce the same tickets, apart from
/// timestamps, which are spread over the last 90 days.
pub fn synthetic_tickets(first_id: TicketId, n: usize) -> Vec<Ticket> {
    let now = Utc::now();

    (0..n)
        .map(|i| {
            let (category, titles) = SEED_CATEGORIES[i % SEED_CATEGORIES.len()];
            let title = titles[(i / SEED_CATEGORIES.len()) % titles.len()];
            let description = format!(
                "{}. Synthetic ticket {} about {}, auto-generated for demo.",
                title,
                i + 1,
                category
            );

            let mut ticket = Ticket::new(first_id + i as u64, title, description)
                .with_category(category)
                .with_status(STATUSES[i % STATUSES.len()])
                .with_priority(PRIORITIES[i % PRIORITIES.len()]);

            let created_at = now - Duration::days(((i * 7) % 91) as i64);
            ticket.created_at = created_at;
            ticket.updated_at = created_at;
            ticket
        })
        .collect()
}
