use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::notification_models::{NotificationRecord, NotificationRow, RecipientId};

/// Durable storage for notification records.
///
/// `insert` must be atomic per record and reject duplicate ids. Lookups that
/// miss return `None`/`0` and leave the error decision to the caller.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    async fn insert(&self, record: &NotificationRecord) -> Result<NotificationRecord>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>>;

    async fn find_page_by_recipient(
        &self,
        recipient_id: RecipientId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationRecord>>;

    async fn count_by_recipient(&self, recipient_id: RecipientId) -> Result<u64>;

    async fn count_unread(&self, recipient_id: RecipientId) -> Result<u64>;

    /// Sets `read_at` only when it is still null.
    async fn mark_as_read(&self, id: Uuid, read_at: DateTime<Utc>) -> Result<Option<NotificationRecord>>;

    async fn mark_all_as_read(&self, recipient_id: RecipientId, read_at: DateTime<Utc>) -> Result<u64>;

    async fn delete(&self, id: Uuid) -> Result<u64>;

    async fn delete_all(&self, recipient_id: RecipientId) -> Result<u64>;

    /// Cheap reachability probe for health checks.
    async fn ping(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct PgNotificationBackend {
    pool: PgPool,
}

impl PgNotificationBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationBackend for PgNotificationBackend {
    async fn insert(&self, record: &NotificationRecord) -> Result<NotificationRecord> {
        let row = sqlx::query_as::<_, NotificationRow>(
            "INSERT INTO notifications (id, recipient_id, kind, payload, read_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(record.id)
        .bind(record.recipient_id)
        .bind(&record.kind)
        .bind(Json(record.payload.clone()))
        .bind(record.read_at)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>> {
        let row = sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn find_page_by_recipient(
        &self,
        recipient_id: RecipientId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationRecord>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications
             WHERE recipient_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(recipient_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_by_recipient(&self, recipient_id: RecipientId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
            .bind(recipient_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn count_unread(&self, recipient_id: RecipientId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications
             WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn mark_as_read(&self, id: Uuid, read_at: DateTime<Utc>) -> Result<Option<NotificationRecord>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            "UPDATE notifications SET read_at = COALESCE(read_at, $2)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(read_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn mark_all_as_read(&self, recipient_id: RecipientId, read_at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = $2
             WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .bind(read_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_all(&self, recipient_id: RecipientId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE recipient_id = $1")
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
