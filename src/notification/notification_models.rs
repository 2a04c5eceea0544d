use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

pub type RecipientId = i64;

pub const DEFAULT_KIND: &str = "system";

/// A single payload value. The set of variants is closed so that payloads
/// serialize the same way everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    // integers above i64::MAX
    UInt(u64),
    Float(f64),
    String(String),
    Array(Vec<PayloadValue>),
    Map(BTreeMap<String, PayloadValue>),
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::String(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::String(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Int(value)
    }
}

impl From<u64> for PayloadValue {
    fn from(value: u64) -> Self {
        PayloadValue::UInt(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

/// Schema-less notification body, keyed by string with ordered keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub BTreeMap<String, PayloadValue>);

#[cfg(test)]
impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.0.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: RecipientId,
    pub kind: String,
    #[schema(value_type = Object)]
    pub payload: Payload,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row shape of the `notifications` table.
#[derive(Debug, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub recipient_id: i64,
    pub kind: String,
    pub payload: Json<Payload>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            recipient_id: row.recipient_id,
            kind: row.kind,
            payload: row.payload.0,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// One page of a recipient's notifications, newest first.
#[derive(Debug, Clone)]
pub struct NotificationPage {
    pub items: Vec<NotificationRecord>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}
