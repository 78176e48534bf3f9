//! Ticket intelligence: category suggestion and similar-ticket retrieval
//! learned from a store of labeled support tickets.

pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod seed;
pub mod state;

pub use error::{AppError, Result};
