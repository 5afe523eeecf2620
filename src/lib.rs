//! Support Inbox — priority-ranked customer messaging.

pub mod config;
pub mod error;
pub mod inbox;
pub mod priority;
pub mod store;
