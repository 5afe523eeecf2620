//! Response shapes for inbox listings and the conversation view.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::priority::PriorityTier;
use crate::store::{SenderType, StoredMessage};

/// Owner info attached to every listed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    pub id: i64,
    pub assigned_agent: Option<String>,
}

/// A stored message plus its customer's current owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxMessage {
    #[serde(flatten)]
    pub message: StoredMessage,
    pub customer: CustomerRef,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub messages: Vec<InboxMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: i64,
    pub total_messages: usize,
    pub high_priority_count: usize,
    pub assigned_agent: Option<String>,
}

impl ConversationSummary {
    /// Summary for a customer that has never written in.
    pub fn empty(id: i64) -> Self {
        Self {
            id,
            total_messages: 0,
            high_priority_count: 0,
            assigned_agent: None,
        }
    }
}

/// A message as shown in the conversation timeline (no priority fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sender_type: SenderType,
}

impl From<StoredMessage> for ConversationEntry {
    fn from(message: StoredMessage) -> Self {
        Self {
            id: message.id,
            content: message.content,
            created_at: message.created_at,
            sender_type: message.sender,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub customer: ConversationSummary,
    pub messages: Vec<ConversationEntry>,
}

impl Conversation {
    /// Build the view from a customer's messages (already oldest first).
    pub fn from_messages(
        id: i64,
        assigned_agent: Option<String>,
        messages: Vec<StoredMessage>,
    ) -> Self {
        let high_priority_count = messages
            .iter()
            .filter(|m| m.priority == PriorityTier::High)
            .count();
        Self {
            customer: ConversationSummary {
                id,
                total_messages: messages.len(),
                high_priority_count,
                assigned_agent,
            },
            messages: messages.into_iter().map(ConversationEntry::from).collect(),
        }
    }
}
