//! Event/ticket catalog collaborator. The ledger reads ticket prices
//! and event-to-vault associations from here; scans write ticket
//! status transitions back through the shared store.

pub mod events;
pub mod tickets;

pub use events::{CreateEventParams, EventCatalog, TicketSaleStats};
pub use tickets::TicketCatalog;
