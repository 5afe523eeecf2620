//! Inbox operations: ingest, reply, claim, and the read-side listings.
//!
//! Every message written here is scored exactly once, at creation time, and
//! the evaluation is stored with the row. Nothing is ever re-scored.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::model::{Conversation, ConversationSummary, CustomerRef, InboxMessage, MessagePage};
use crate::config::PageConfig;
use crate::error::{DatabaseError, InboxError};
use crate::priority::PriorityEvaluator;
use crate::store::{
    ClaimOutcome, Customer, Database, MessageFilter, NewMessage, Page, SenderType, StoredMessage,
};

/// Inbox service shared by the HTTP handlers.
pub struct InboxService {
    db: Arc<dyn Database>,
    evaluator: PriorityEvaluator,
    paging: PageConfig,
}

impl InboxService {
    pub fn new(db: Arc<dyn Database>, paging: PageConfig) -> Self {
        Self::with_evaluator(db, paging, PriorityEvaluator::default())
    }

    pub fn with_evaluator(
        db: Arc<dyn Database>,
        paging: PageConfig,
        evaluator: PriorityEvaluator,
    ) -> Self {
        Self {
            db,
            evaluator,
            paging,
        }
    }

    /// Resolve client paging input. Missing or zero values use the defaults;
    /// the limit is capped at the configured maximum.
    pub fn page(&self, page: Option<u32>, limit: Option<u32>) -> Page {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(self.paging.default_limit)
            .min(self.paging.max_limit);
        Page::new(page, limit)
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Persist an inbound customer message, creating the customer on first contact.
    pub async fn ingest_customer_message(
        &self,
        customer_id: i64,
        content: &str,
    ) -> Result<StoredMessage, InboxError> {
        if customer_id <= 0 || content.trim().is_empty() {
            return Err(InboxError::Validation(
                "customerId and content required".into(),
            ));
        }

        self.db.upsert_customer(customer_id).await?;

        let evaluation = self.evaluator.evaluate(content);
        let message = self
            .db
            .insert_message(NewMessage::now(
                customer_id,
                content,
                SenderType::Customer,
                evaluation,
            ))
            .await?;

        info!(
            message_id = %message.id,
            customer_id,
            priority = %message.priority,
            score = message.priority_score,
            "Customer message ingested"
        );
        Ok(message)
    }

    /// Post an agent reply into the conversation of `message_id`'s customer.
    ///
    /// The customer must have been claimed first.
    pub async fn reply(
        &self,
        message_id: &str,
        content: &str,
    ) -> Result<StoredMessage, InboxError> {
        if content.trim().is_empty() {
            return Err(InboxError::Validation("Reply content is required".into()));
        }

        let original = self
            .db
            .get_message(message_id)
            .await?
            .ok_or_else(|| InboxError::NotFound("Original message not found".into()))?;

        let customer = self
            .db
            .get_customer(original.customer_id)
            .await?
            .ok_or_else(|| InboxError::NotFound("Customer not found".into()))?;

        let Some(agent) = customer.assigned_agent else {
            return Err(InboxError::Conflict(
                "Customer must be claimed before replying".into(),
            ));
        };

        let evaluation = self.evaluator.evaluate(content);
        let reply = self
            .db
            .insert_message(NewMessage::now(
                customer.id,
                content,
                SenderType::Agent,
                evaluation,
            ))
            .await?;

        info!(
            message_id = %reply.id,
            in_reply_to = message_id,
            customer_id = customer.id,
            agent = %agent,
            "Agent reply stored"
        );
        Ok(reply)
    }

    /// Claim the customer behind `message_id` for `agent`.
    pub async fn claim(&self, message_id: &str, agent: &str) -> Result<Customer, InboxError> {
        let agent = agent.trim();
        if agent.is_empty() {
            return Err(InboxError::Validation("Agent name is required".into()));
        }

        let message = self
            .db
            .get_message(message_id)
            .await?
            .ok_or_else(|| InboxError::NotFound("Message not found".into()))?;

        match self.db.claim_customer(message.customer_id, agent).await {
            Ok(ClaimOutcome::Claimed(customer)) => {
                info!(customer_id = customer.id, agent = agent, "Customer claimed");
                Ok(customer)
            }
            Ok(ClaimOutcome::AlreadyClaimed { assigned_agent }) => {
                debug!(
                    customer_id = message.customer_id,
                    assigned_agent = %assigned_agent,
                    requested_by = agent,
                    "Claim rejected"
                );
                Err(InboxError::AlreadyClaimed { assigned_agent })
            }
            Err(DatabaseError::NotFound { .. }) => {
                Err(InboxError::NotFound("Customer not found".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Triage view: highest score first, then newest.
    pub async fn inbox(&self, page: Page) -> Result<MessagePage, InboxError> {
        let messages = self.db.list_inbox(page).await?;
        let total = self.db.count_messages(&MessageFilter::default()).await?;
        Ok(MessagePage {
            page: page.page,
            limit: page.limit,
            total,
            messages: self.attach_customers(messages).await?,
        })
    }

    /// Filtered listing, newest first.
    pub async fn search(
        &self,
        filter: &MessageFilter,
        page: Page,
    ) -> Result<MessagePage, InboxError> {
        let messages = self.db.search_messages(filter, page).await?;
        let total = self.db.count_messages(filter).await?;
        Ok(MessagePage {
            page: page.page,
            limit: page.limit,
            total,
            messages: self.attach_customers(messages).await?,
        })
    }

    pub async fn message(&self, id: &str) -> Result<InboxMessage, InboxError> {
        let message = self
            .db
            .get_message(id)
            .await?
            .ok_or_else(|| InboxError::NotFound("Message not found".into()))?;

        let mut attached = self.attach_customers(vec![message]).await?;
        attached
            .pop()
            .ok_or_else(|| InboxError::NotFound("Message not found".into()))
    }

    /// Conversation view. An unknown customer yields an empty conversation.
    pub async fn conversation(&self, customer_id: i64) -> Result<Conversation, InboxError> {
        let Some(customer) = self.db.get_customer(customer_id).await? else {
            return Ok(Conversation {
                customer: ConversationSummary::empty(customer_id),
                messages: Vec::new(),
            });
        };

        let messages = self.db.list_customer_messages(customer_id).await?;
        Ok(Conversation::from_messages(
            customer.id,
            customer.assigned_agent,
            messages,
        ))
    }

    async fn attach_customers(
        &self,
        messages: Vec<StoredMessage>,
    ) -> Result<Vec<InboxMessage>, InboxError> {
        let mut agents: HashMap<i64, Option<String>> = HashMap::new();
        let mut attached = Vec::with_capacity(messages.len());

        for message in messages {
            let assigned_agent = match agents.get(&message.customer_id) {
                Some(agent) => agent.clone(),
                None => {
                    let agent = self
                        .db
                        .get_customer(message.customer_id)
                        .await?
                        .and_then(|c| c.assigned_agent);
                    agents.insert(message.customer_id, agent.clone());
                    agent
                }
            };
            attached.push(InboxMessage {
                customer: CustomerRef {
                    id: message.customer_id,
                    assigned_agent,
                },
                message,
            });
        }
        Ok(attached)
    }
}
