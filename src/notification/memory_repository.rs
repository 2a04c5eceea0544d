use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::notification_models::{NotificationRecord, RecipientId};
use super::notification_repository::NotificationBackend;

/// Process-local backend. Records live as long as the process does.
#[derive(Clone, Default)]
pub struct InMemoryNotificationBackend {
    records: Arc<DashMap<Uuid, NotificationRecord>>,
    // None accepts every recipient
    recipients: Option<Arc<DashSet<RecipientId>>>,
}

impl InMemoryNotificationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the given recipients may own notifications; inserts for anyone
    /// else fail the way a foreign key violation would.
    pub fn with_recipients(recipients: impl IntoIterator<Item = RecipientId>) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            recipients: Some(Arc::new(recipients.into_iter().collect())),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    fn recipient_records(&self, recipient_id: RecipientId) -> Vec<NotificationRecord> {
        self.records
            .iter()
            .filter(|entry| entry.value().recipient_id == recipient_id)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl NotificationBackend for InMemoryNotificationBackend {
    async fn insert(&self, record: &NotificationRecord) -> Result<NotificationRecord> {
        if let Some(recipients) = &self.recipients {
            if !recipients.contains(&record.recipient_id) {
                return Err(AppError::Persistence(format!(
                    "recipient {} does not exist",
                    record.recipient_id
                )));
            }
        }

        match self.records.entry(record.id) {
            Entry::Occupied(_) => Err(AppError::Persistence(format!(
                "notification {} already exists",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record.clone())
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>> {
        Ok(self.records.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_page_by_recipient(
        &self,
        recipient_id: RecipientId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationRecord>> {
        let mut records = self.recipient_records(recipient_id);
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Ok(records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_recipient(&self, recipient_id: RecipientId) -> Result<u64> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.value().recipient_id == recipient_id)
            .count() as u64)
    }

    async fn count_unread(&self, recipient_id: RecipientId) -> Result<u64> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.value().recipient_id == recipient_id && entry.value().read_at.is_none())
            .count() as u64)
    }

    async fn mark_as_read(&self, id: Uuid, read_at: DateTime<Utc>) -> Result<Option<NotificationRecord>> {
        Ok(self.records.get_mut(&id).map(|mut entry| {
            let record = entry.value_mut();
            if record.read_at.is_none() {
                record.read_at = Some(read_at);
            }
            record.clone()
        }))
    }

    async fn mark_all_as_read(&self, recipient_id: RecipientId, read_at: DateTime<Utc>) -> Result<u64> {
        let mut affected = 0;
        for mut entry in self.records.iter_mut() {
            let record = entry.value_mut();
            if record.recipient_id == recipient_id && record.read_at.is_none() {
                record.read_at = Some(read_at);
                affected += 1;
            }
        }

        Ok(affected)
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        Ok(self.records.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_all(&self, recipient_id: RecipientId) -> Result<u64> {
        let before = self.records.len();
        self.records.retain(|_, record| record.recipient_id != recipient_id);
        Ok(before.saturating_sub(self.records.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::notification_models::Payload;
    use chrono::Duration;

    fn record(recipient_id: RecipientId, created_at: DateTime<Utc>) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            recipient_id,
            kind: "system".to_string(),
            payload: Payload::new().with("msg", "hi"),
            read_at: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let backend = InMemoryNotificationBackend::new();
        let first = record(1, Utc::now());
        backend.insert(&first).await.unwrap();

        let mut second = record(1, Utc::now());
        second.id = first.id;
        let err = backend.insert(&second).await.unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.find_by_id(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_unknown_recipient_is_rejected() {
        let backend = InMemoryNotificationBackend::with_recipients([7]);
        assert!(backend.insert(&record(7, Utc::now())).await.is_ok());

        let err = backend.insert(&record(8, Utc::now())).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_page_is_newest_first() {
        let backend = InMemoryNotificationBackend::new();
        let base = Utc::now();
        let oldest = record(1, base - Duration::minutes(2));
        let middle = record(1, base - Duration::minutes(1));
        let newest = record(1, base);
        for r in [&middle, &oldest, &newest] {
            backend.insert(r).await.unwrap();
        }
        backend.insert(&record(2, base)).await.unwrap();

        let first_page = backend.find_page_by_recipient(1, 2, 0).await.unwrap();
        assert_eq!(
            first_page.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![newest.id, middle.id]
        );

        let second_page = backend.find_page_by_recipient(1, 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, oldest.id);

        assert_eq!(backend.count_by_recipient(1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_mark_as_read_keeps_first_timestamp() {
        let backend = InMemoryNotificationBackend::new();
        let r = record(1, Utc::now());
        backend.insert(&r).await.unwrap();

        let first = Utc::now();
        let later = first + Duration::seconds(30);
        let once = backend.mark_as_read(r.id, first).await.unwrap().unwrap();
        let twice = backend.mark_as_read(r.id, later).await.unwrap().unwrap();

        assert_eq!(once.read_at, Some(first));
        assert_eq!(twice.read_at, Some(first));
        assert!(backend.mark_as_read(Uuid::new_v4(), first).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bulk_operations_are_scoped_to_recipient() {
        let backend = InMemoryNotificationBackend::new();
        for _ in 0..3 {
            backend.insert(&record(1, Utc::now())).await.unwrap();
        }
        backend.insert(&record(2, Utc::now())).await.unwrap();

        assert_eq!(backend.mark_all_as_read(1, Utc::now()).await.unwrap(), 3);
        assert_eq!(backend.mark_all_as_read(1, Utc::now()).await.unwrap(), 0);
        assert_eq!(backend.count_unread(1).await.unwrap(), 0);
        assert_eq!(backend.count_unread(2).await.unwrap(), 1);

        assert_eq!(backend.delete_all(1).await.unwrap(), 3);
        assert_eq!(backend.count_by_recipient(1).await.unwrap(), 0);
        assert_eq!(backend.count_by_recipient(2).await.unwrap(), 1);
    }
}
