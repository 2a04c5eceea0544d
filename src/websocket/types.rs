use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::broadcast::BroadcastMessage;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Notification(BroadcastMessage),
    NotificationRead(NotificationReadPayload),
    AllRead(AllReadPayload),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationReadPayload {
    pub id: Uuid,
    pub read_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllReadPayload {
    pub affected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorPayload {
    pub message: String,
}

// Client-to-server messages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    MarkRead { id: Uuid },
    MarkAllRead,
}
