//! Support inbox — customers write in, agents claim and reply.
//!
//! The service layer owns the rules around ownership (one agent per
//! customer, reply only after claim). The routes are a thin JSON shell.

pub mod model;
pub mod routes;
pub mod service;

pub use model::{Conversation, ConversationSummary, CustomerRef, InboxMessage, MessagePage};
pub use routes::{AppState, inbox_routes};
pub use service::InboxService;
