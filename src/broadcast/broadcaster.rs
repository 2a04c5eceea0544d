use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::notification::notification_models::{NotificationRecord, Payload, RecipientId};

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Broadcast publish timed out")]
    TimedOut,
}

/// Event pushed to a recipient's topic once a notification is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BroadcastMessage {
    pub id: Uuid,
    pub kind: String,
    #[schema(value_type = Object)]
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}

impl From<&NotificationRecord> for BroadcastMessage {
    fn from(record: &NotificationRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind.clone(),
            payload: record.payload.clone(),
            created_at: record.created_at,
        }
    }
}

/// Topic name for a recipient. Subscribers derive it the same way.
pub fn topic_for(recipient_id: RecipientId) -> String {
    format!("user:{}", recipient_id)
}

/// Fire-and-forget publish side of a pub/sub transport.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, topic: &str, message: &BroadcastMessage) -> Result<(), BroadcastError>;
}
