use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use ticket_intel::{
    config::Config,
    ml::{ModelStore, TicketIntelligence},
    models::{Ticket, TicketId},
    seed::synthetic_tickets,
    state::{create_store, TicketStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "ticket-intel", version)]
#[command(about = "Category suggestion and similar-ticket search for support tickets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create synthetic labeled tickets
    Seed {
        /// Number of tickets to create
        #[arg(short, long, default_value_t = 200)]
        n: usize,

        /// Delete every existing ticket first
        #[arg(long)]
        clear: bool,
    },

    /// Add a single ticket
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// Train the classifier on every labeled ticket
    Train,

    /// Suggest a category
    #[command(group(ArgGroup::new("input").required(true).args(["text", "ticket"])))]
    Predict {
        /// Free text to classify
        #[arg(long)]
        text: Option<String>,

        /// Classify a stored ticket
        #[arg(long, value_name = "TICKET_ID")]
        ticket: Option<TicketId>,

        /// Write the predicted category back onto the ticket
        #[arg(long, requires = "ticket")]
        apply: bool,
    },

    /// Find similar tickets
    #[command(group(ArgGroup::new("input").required(true).args(["text", "ticket"])))]
    Similar {
        /// Free text to match
        #[arg(long)]
        text: Option<String>,

        /// Match a stored ticket (the ticket itself is excluded)
        #[arg(long, value_name = "TICKET_ID")]
        ticket: Option<TicketId>,

        /// Number of results
        #[arg(short = 'k', long)]
        top: Option<usize>,
    },

    /// Show what the model was trained on
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("Failed to load configuration")?;
    config.validate()?;

    init_tracing(&config);

    let store = create_store(&config.store)?;
    let model_store = Arc::new(ModelStore::new(config.ml.model_path.clone()));
    let service = TicketIntelligence::new(store.clone(), model_store, config.ml.clone());

    match cli.command {
        Commands::Seed { n, clear } => {
            if clear {
                for ticket in store.list_tickets().await? {
                    store.delete_ticket(ticket.id).await?;
                }
            }

            let first_id = store.next_ticket_id().await?;
            let tickets = synthetic_tickets(first_id, n);
            for ticket in &tickets {
                store.save_ticket(ticket).await?;
            }

            tracing::info!(created = tickets.len(), "Synthetic tickets created");
            print_json(&serde_json::json!({
                "created": tickets.len(),
                "total": store.count_tickets().await?,
            }))?;
        }

        Commands::Add {
            title,
            description,
            category,
        } => {
            let id = store.next_ticket_id().await?;
            let mut ticket = Ticket::new(id, title, description);
            if let Some(category) = category {
                ticket.set_category(category);
            }
            store.save_ticket(&ticket).await?;
            print_json(&ticket)?;
        }

        Commands::Train => {
            let report = service.train().await?;
            print_json(&report)?;
        }

        Commands::Predict {
            text,
            ticket,
            apply,
        } => {
            let prediction = match (ticket, text) {
                (Some(id), _) if apply => service.apply_prediction(id).await?,
                (Some(id), _) => service.predict_for_ticket(id).await?,
                (None, Some(text)) => service.predict(&text)?,
                (None, None) => anyhow::bail!("either --text or --ticket is required"),
            };
            print_json(&prediction)?;
        }

        Commands::Similar { text, ticket, top } => match (ticket, text) {
            (Some(id), _) => print_json(&service.similar_to_ticket(id, top).await?)?,
            (None, Some(text)) => print_json(&service.find_similar(&text, top)?)?,
            (None, None) => anyhow::bail!("either --text or --ticket is required"),
        },

        Commands::Stats => {
            print_json(&serde_json::json!({
                "tickets": store.count_tickets().await?,
                "labeled_tickets": store.list_labeled_tickets().await?.len(),
                "model": service.stats()?,
            }))?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
