use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::notification_models::{NotificationPage, NotificationRecord, Payload, RecipientId};
use super::notification_repository::NotificationBackend;

/// Supplies record ids and timestamps.
pub trait IdentitySource: Send + Sync {
    fn next_id(&self) -> Uuid;

    fn now(&self) -> DateTime<Utc>;
}

/// Random v4 ids and the wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl IdentitySource for SystemIdentity {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Owns the lifecycle of notification records: creation stamps the id and
/// `created_at`, reads and the mark-as-read/delete flows go through here too.
#[derive(Clone)]
pub struct NotificationStore {
    backend: Arc<dyn NotificationBackend>,
    identity: Arc<dyn IdentitySource>,
}

impl NotificationStore {
    pub fn new(backend: Arc<dyn NotificationBackend>, identity: Arc<dyn IdentitySource>) -> Self {
        Self { backend, identity }
    }

    pub fn with_system_identity(backend: Arc<dyn NotificationBackend>) -> Self {
        Self::new(backend, Arc::new(SystemIdentity))
    }

    pub async fn create(
        &self,
        recipient_id: RecipientId,
        kind: &str,
        payload: Payload,
    ) -> Result<NotificationRecord> {
        let record = NotificationRecord {
            id: self.identity.next_id(),
            recipient_id,
            kind: kind.to_string(),
            payload,
            read_at: None,
            created_at: self.identity.now(),
        };

        let stored = self.backend.insert(&record).await.map_err(into_persistence)?;

        tracing::debug!(
            notification_id = %stored.id,
            recipient_id = stored.recipient_id,
            kind = %stored.kind,
            "notification created"
        );

        Ok(stored)
    }

    pub async fn get(&self, id: Uuid) -> Result<NotificationRecord> {
        self.backend
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Like `get`, but a record owned by someone else is reported as missing.
    pub async fn get_for_recipient(&self, recipient_id: RecipientId, id: Uuid) -> Result<NotificationRecord> {
        let record = self.get(id).await?;
        if record.recipient_id != recipient_id {
            return Err(not_found(id));
        }

        Ok(record)
    }

    pub async fn list(&self, recipient_id: RecipientId, page: u32, limit: u32) -> Result<NotificationPage> {
        let page = page.max(1);
        let offset = (page as i64 - 1) * limit as i64;

        let items = self
            .backend
            .find_page_by_recipient(recipient_id, limit as i64, offset)
            .await?;
        let total = self.backend.count_by_recipient(recipient_id).await?;

        Ok(NotificationPage {
            items,
            total,
            page,
            limit,
        })
    }

    pub async fn unread_count(&self, recipient_id: RecipientId) -> Result<u64> {
        self.backend.count_unread(recipient_id).await
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<NotificationRecord> {
        self.backend
            .mark_as_read(id, self.identity.now())
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn mark_read_for_recipient(&self, recipient_id: RecipientId, id: Uuid) -> Result<NotificationRecord> {
        self.get_for_recipient(recipient_id, id).await?;
        self.mark_read(id).await
    }

    pub async fn mark_all_read(&self, recipient_id: RecipientId) -> Result<u64> {
        let affected = self
            .backend
            .mark_all_as_read(recipient_id, self.identity.now())
            .await?;

        tracing::debug!(recipient_id, affected, "notifications marked as read");
        Ok(affected)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.backend.delete(id).await? == 0 {
            return Err(not_found(id));
        }

        Ok(())
    }

    pub async fn delete_for_recipient(&self, recipient_id: RecipientId, id: Uuid) -> Result<()> {
        self.get_for_recipient(recipient_id, id).await?;
        self.delete(id).await
    }

    pub async fn delete_all(&self, recipient_id: RecipientId) -> Result<u64> {
        let affected = self.backend.delete_all(recipient_id).await?;

        tracing::debug!(recipient_id, affected, "notifications deleted");
        Ok(affected)
    }

    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Notification {} not found", id))
}

// Any failure while creating a record is a persistence failure to the caller.
fn into_persistence(err: AppError) -> AppError {
    match err {
        AppError::Persistence(_) => err,
        other => AppError::Persistence(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::memory_repository::InMemoryNotificationBackend;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Sequential ids and a clock that advances one second per call.
    struct FixedIdentity {
        counter: AtomicU64,
        epoch: DateTime<Utc>,
    }

    impl FixedIdentity {
        fn new() -> Self {
            Self {
                counter: AtomicU64::new(0),
                epoch: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            }
        }
    }

    impl IdentitySource for FixedIdentity {
        fn next_id(&self) -> Uuid {
            Uuid::from_u128(self.counter.fetch_add(1, Ordering::SeqCst) as u128 + 1)
        }

        fn now(&self) -> DateTime<Utc> {
            let tick = self.counter.load(Ordering::SeqCst) as i64;
            self.epoch + chrono::Duration::seconds(tick)
        }
    }

    fn store() -> NotificationStore {
        NotificationStore::new(
            Arc::new(InMemoryNotificationBackend::new()),
            Arc::new(FixedIdentity::new()),
        )
    }

    #[tokio::test]
    async fn test_create_stamps_identity_and_time() {
        let store = store();
        let record = store
            .create(42, "system", Payload::new().with("msg", "hello"))
            .await
            .unwrap();

        assert_eq!(record.id, Uuid::from_u128(1));
        assert_eq!(record.recipient_id, 42);
        assert_eq!(record.kind, "system");
        assert!(record.read_at.is_none());
        assert_eq!(record.created_at, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap());
    }

    #[tokio::test]
    async fn test_get_returns_stored_record() {
        let store = store();
        let record = store.create(1, "system", Payload::new()).await.unwrap();
        assert_eq!(store.get(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let err = store().get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let store = store();
        let record = store.create(1, "system", Payload::new()).await.unwrap();

        let first = store.mark_read(record.id).await.unwrap();
        let second = store.mark_read(record.id).await.unwrap();

        assert!(first.read_at.is_some());
        assert_eq!(first.read_at, second.read_at);
        assert_eq!(store.get(record.id).await.unwrap().read_at, first.read_at);
    }

    #[tokio::test]
    async fn test_mark_read_missing_is_not_found() {
        let err = store().mark_read(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let store = store();
        let mut ids = Vec::new();
        for i in 0..5i64 {
            let record = store
                .create(9, "system", Payload::new().with("n", i))
                .await
                .unwrap();
            ids.push(record.id);
        }
        store.create(10, "system", Payload::new()).await.unwrap();

        let page = store.list(9, 1, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

        let last = store.list(9, 3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].id, ids[0]);

        // page 0 is treated as the first page
        assert_eq!(store.list(9, 0, 2).await.unwrap().page, 1);
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let store = store();
        let a = store.create(1, "system", Payload::new()).await.unwrap();
        store.create(1, "system", Payload::new()).await.unwrap();
        let other = store.create(2, "system", Payload::new()).await.unwrap();

        store.delete(a.id).await.unwrap();
        assert!(matches!(store.delete(a.id).await.unwrap_err(), AppError::NotFound(_)));

        assert_eq!(store.delete_all(1).await.unwrap(), 1);
        assert_eq!(store.unread_count(1).await.unwrap(), 0);
        assert!(store.get(other.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_recipient_scoped_operations_hide_foreign_records() {
        let store = store();
        let record = store.create(1, "system", Payload::new()).await.unwrap();

        assert_eq!(store.get_for_recipient(1, record.id).await.unwrap(), record);
        assert!(matches!(
            store.get_for_recipient(2, record.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            store.mark_read_for_recipient(2, record.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            store.delete_for_recipient(2, record.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        let untouched = store.get(record.id).await.unwrap();
        assert!(untouched.read_at.is_none());

        assert!(store.mark_read_for_recipient(1, record.id).await.unwrap().read_at.is_some());
        store.delete_for_recipient(1, record.id).await.unwrap();
        assert!(matches!(store.get(record.id).await.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_recipient_is_persistence_error() {
        let store = NotificationStore::with_system_identity(Arc::new(
            InMemoryNotificationBackend::with_recipients([1]),
        ));
        let err = store.create(2, "system", Payload::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }
}
