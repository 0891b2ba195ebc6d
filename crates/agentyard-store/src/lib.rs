//! agentyard-store — the single writer for tickets, run state, and
//! system config.

pub mod state_store;
pub mod ticket_hierarchy;

pub use state_store::StateStore;
pub use ticket_hierarchy::{ticket_level, TicketHierarchy, TicketLevel};
