//! TicketVault Backend Library
//!
//! Event-financing ledger: organizers raise loans against future
//! ticket revenue, investors fund them, ticket sales accumulate in
//! escrow, gate scans amortize vault debt, and settlement distributes
//! the proceeds.

pub mod api;
pub mod catalog;
pub mod ledger;
pub mod models;
pub mod store;
