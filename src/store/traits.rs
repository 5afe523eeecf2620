//! `Database` trait and the persisted record types.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::priority::{PriorityEvaluation, PriorityTier};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SenderType {
    Customer,
    Agent,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Agent => "AGENT",
        }
    }
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(Self::Customer),
            "AGENT" => Ok(Self::Agent),
            other => Err(DatabaseError::Query(format!("unknown sender type: {other}"))),
        }
    }
}

/// A customer identity. Created on first message, claimed at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message as written by the caller, before the store assigns id/timestamps.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub customer_id: i64,
    pub content: String,
    pub sender: SenderType,
    pub evaluation: PriorityEvaluation,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// Build a message stamped with the current time.
    pub fn now(
        customer_id: i64,
        content: impl Into<String>,
        sender: SenderType,
        evaluation: PriorityEvaluation,
    ) -> Self {
        Self {
            customer_id,
            content: content.into(),
            sender,
            evaluation,
            created_at: Utc::now(),
        }
    }
}

/// A persisted message. Priority fields are frozen at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub customer_id: i64,
    pub content: String,
    #[serde(rename = "senderType")]
    pub sender: SenderType,
    pub priority: PriorityTier,
    pub priority_score: u8,
    pub priority_reason: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This call set the agent.
    Claimed(Customer),
    /// Someone already owns the customer; nothing changed.
    AlreadyClaimed { assigned_agent: String },
}

/// Offset/limit window over a listing. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Filters for message search. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Case-insensitive substring of the content.
    ///
    /// Case folding is ASCII-only to match SQLite's `lower()`: `"REFUND"`
    /// finds `"refund"`, but `"ÜRGENT"` does not find `"ürgent"`.
    pub query: Option<String>,
    pub customer_id: Option<i64>,
}

/// Backend-agnostic persistence for customers and messages.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Customers ───────────────────────────────────────────────────

    /// Create the customer if absent. Existing rows are left untouched.
    async fn upsert_customer(&self, id: i64) -> Result<Customer, DatabaseError>;

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, DatabaseError>;

    /// Assign `agent` only if nobody owns the customer yet.
    async fn claim_customer(&self, id: i64, agent: &str) -> Result<ClaimOutcome, DatabaseError>;

    // ── Messages ────────────────────────────────────────────────────

    async fn insert_message(&self, message: NewMessage) -> Result<StoredMessage, DatabaseError>;

    async fn get_message(&self, id: &str) -> Result<Option<StoredMessage>, DatabaseError>;

    /// Inbox order: priority score descending, then newest first.
    async fn list_inbox(&self, page: Page) -> Result<Vec<StoredMessage>, DatabaseError>;

    async fn count_messages(&self, filter: &MessageFilter) -> Result<u64, DatabaseError>;

    /// Filtered listing, newest first.
    async fn search_messages(
        &self,
        filter: &MessageFilter,
        page: Page,
    ) -> Result<Vec<StoredMessage>, DatabaseError>;

    /// Full conversation for one customer, oldest first.
    async fn list_customer_messages(
        &self,
        customer_id: i64,
    ) -> Result<Vec<StoredMessage>, DatabaseError>;
}
