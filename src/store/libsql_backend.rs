//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use libsql::params::Params;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::priority::PriorityTier;
use crate::store::migrations;
use crate::store::traits::{
    ClaimOutcome, Customer, Database, MessageFilter, NewMessage, Page, StoredMessage,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical write format. Fixed precision keeps text ordering chronological.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_customer(row: &libsql::Row) -> Result<Customer, libsql::Error> {
    let created_str: String = row.get(2)?;
    Ok(Customer {
        id: row.get(0)?,
        assigned_agent: row.get::<String>(1).ok(),
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql Row to a StoredMessage.
///
/// Column order matches MESSAGE_COLUMNS.
fn row_to_message(row: &libsql::Row) -> Result<StoredMessage, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));

    let sender_str: String = row.get(3).map_err(parse)?;
    let priority_str: String = row.get(4).map_err(parse)?;
    let score: i64 = row.get(5).map_err(parse)?;
    let created_str: String = row.get(7).map_err(parse)?;

    Ok(StoredMessage {
        id: row.get(0).map_err(parse)?,
        customer_id: row.get(1).map_err(parse)?,
        content: row.get(2).map_err(parse)?,
        sender: sender_str.parse()?,
        priority: priority_str
            .parse::<PriorityTier>()
            .map_err(|e| DatabaseError::Query(e.to_string()))?,
        priority_score: u8::try_from(score)
            .map_err(|_| DatabaseError::Query(format!("priority_score out of range: {score}")))?,
        priority_reason: row.get::<String>(6).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
    })
}

async fn collect_messages(
    mut rows: libsql::Rows,
    op: &str,
) -> Result<Vec<StoredMessage>, DatabaseError> {
    let mut messages = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
    {
        match row_to_message(&row) {
            Ok(msg) => messages.push(msg),
            Err(e) => warn!("Skipping message row: {e}"),
        }
    }
    Ok(messages)
}

/// Build a WHERE clause and its positional parameters for a filter.
///
/// Content matching lower-cases both sides ASCII-only so the comparison is
/// consistent with SQLite's built-in `lower()`.
fn filter_clause(filter: &MessageFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(query) = filter.query.as_deref().filter(|q| !q.is_empty()) {
        values.push(Value::Text(query.to_ascii_lowercase()));
        conditions.push(format!("instr(lower(content), ?{}) > 0", values.len()));
    }
    if let Some(customer_id) = filter.customer_id {
        values.push(Value::Integer(customer_id));
        conditions.push(format!("customer_id = ?{}", values.len()));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, values)
}

fn page_values(page: Page) -> [Value; 2] {
    [
        Value::Integer(i64::from(page.limit)),
        Value::Integer(page.offset() as i64),
    ]
}

// ── Trait implementation ────────────────────────────────────────────

const CUSTOMER_COLUMNS: &str = "id, assigned_agent, created_at";

const MESSAGE_COLUMNS: &str =
    "id, customer_id, content, sender_type, priority, priority_score, priority_reason, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Customers ───────────────────────────────────────────────────

    async fn upsert_customer(&self, id: i64) -> Result<Customer, DatabaseError> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                "INSERT INTO customers (id, created_at) VALUES (?1, ?2)
                 ON CONFLICT(id) DO NOTHING",
                params![id, format_datetime(&Utc::now())],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_customer: {e}")))?;

        if inserted > 0 {
            debug!(customer_id = id, "Customer created");
        }

        self.get_customer(id).await?.ok_or_else(|| DatabaseError::NotFound {
            entity: "customer".into(),
            id: id.to_string(),
        })
    }

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_customer: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let customer = row_to_customer(&row)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(customer))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_customer: {e}"))),
        }
    }

    async fn claim_customer(&self, id: i64, agent: &str) -> Result<ClaimOutcome, DatabaseError> {
        let conn = self.conn();
        // Conditional update: only one concurrent claim can flip NULL → agent.
        let updated = conn
            .execute(
                "UPDATE customers SET assigned_agent = ?1
                 WHERE id = ?2 AND assigned_agent IS NULL",
                params![agent, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("claim_customer: {e}")))?;

        let customer = self.get_customer(id).await?.ok_or_else(|| DatabaseError::NotFound {
            entity: "customer".into(),
            id: id.to_string(),
        })?;

        if updated > 0 {
            debug!(customer_id = id, agent = agent, "Customer claimed");
            return Ok(ClaimOutcome::Claimed(customer));
        }

        match customer.assigned_agent {
            Some(assigned_agent) => Ok(ClaimOutcome::AlreadyClaimed { assigned_agent }),
            None => Err(DatabaseError::Constraint(format!(
                "claim_customer: customer {id} was not updated and has no agent"
            ))),
        }
    }

    // ── Messages ────────────────────────────────────────────────────

    async fn insert_message(&self, message: NewMessage) -> Result<StoredMessage, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let stored = StoredMessage {
            id: id.clone(),
            customer_id: message.customer_id,
            priority: message.evaluation.tier,
            priority_score: message.evaluation.score,
            priority_reason: message.evaluation.reason(),
            content: message.content,
            sender: message.sender,
            // Match the stored precision so the returned record equals a re-read.
            created_at: message.created_at.trunc_subsecs(6),
        };

        let conn = self.conn();
        conn.execute(
            "INSERT INTO messages (id, customer_id, content, sender_type, priority,
                priority_score, priority_reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                stored.customer_id,
                stored.content.clone(),
                stored.sender.as_str(),
                stored.priority.as_str(),
                i64::from(stored.priority_score),
                stored.priority_reason.clone(),
                format_datetime(&stored.created_at),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_message: {e}")))?;

        debug!(
            id = %stored.id,
            customer_id = stored.customer_id,
            sender = %stored.sender,
            score = stored.priority_score,
            "Message inserted into DB"
        );
        Ok(stored)
    }

    async fn get_message(&self, id: &str) -> Result<Option<StoredMessage>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_message(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_message: {e}"))),
        }
    }

    async fn list_inbox(&self, page: Page) -> Result<Vec<StoredMessage>, DatabaseError> {
        let conn = self.conn();
        let rows = conn
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     ORDER BY priority_score DESC, created_at DESC, rowid DESC
                     LIMIT ?1 OFFSET ?2"
                ),
                Params::Positional(page_values(page).to_vec()),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_inbox: {e}")))?;

        collect_messages(rows, "list_inbox").await
    }

    async fn count_messages(&self, filter: &MessageFilter) -> Result<u64, DatabaseError> {
        let (clause, values) = filter_clause(filter);
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT COUNT(*) FROM messages{clause}"),
                Params::Positional(values),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count_messages: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("count_messages: {e}")))?;
        let count: i64 = match row {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("count_messages: {e}")))?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn search_messages(
        &self,
        filter: &MessageFilter,
        page: Page,
    ) -> Result<Vec<StoredMessage>, DatabaseError> {
        let (clause, mut values) = filter_clause(filter);
        let limit_idx = values.len() + 1;
        let offset_idx = values.len() + 2;
        values.extend(page_values(page));

        let conn = self.conn();
        let rows = conn
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages{clause}
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
                ),
                Params::Positional(values),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("search_messages: {e}")))?;

        collect_messages(rows, "search_messages").await
    }

    async fn list_customer_messages(
        &self,
        customer_id: i64,
    ) -> Result<Vec<StoredMessage>, DatabaseError> {
        let conn = self.conn();
        let rows = conn
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE customer_id = ?1
                     ORDER BY created_at ASC, rowid ASC"
                ),
                params![customer_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_customer_messages: {e}")))?;

        collect_messages(rows, "list_customer_messages").await
    }
}
