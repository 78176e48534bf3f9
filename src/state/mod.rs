pub mod store;
pub mod sled_store;
pub mod factory;

pub use store::*;
pub use sled_store::SledTicketStore;
pub use factory::{create_store, create_in_memory_store};
