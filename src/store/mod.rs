//! Persistence layer — libSQL-backed storage for customers and messages.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    ClaimOutcome, Customer, Database, MessageFilter, NewMessage, Page, SenderType, StoredMessage,
};
