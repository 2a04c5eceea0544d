use crate::{
    broadcast::{topic_for, BroadcastError, BroadcastMessage, Broadcaster},
    error::{AppError, Result},
};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::notification_models::{NotificationRecord, Payload, RecipientId};
use super::notification_store::NotificationStore;

/// Counters for real-time delivery attempts.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    published: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliverySnapshot {
    pub published: u64,
    pub dropped: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Presents "store, then tell subscribers" as one send operation. The stored
/// record is the source of truth; the broadcast is best effort.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: NotificationStore,
    broadcaster: Arc<dyn Broadcaster>,
    publish_timeout: Duration,
    stats: Arc<DeliveryStats>,
}

impl NotificationDispatcher {
    pub fn new(store: NotificationStore, broadcaster: Arc<dyn Broadcaster>, publish_timeout: Duration) -> Self {
        Self {
            store,
            broadcaster,
            publish_timeout,
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }

    /// Persists the notification, then publishes it within the configured
    /// publish timeout. The timeout starts once the record is stored.
    pub async fn send(&self, recipient_id: RecipientId, kind: &str, payload: Payload) -> Result<NotificationRecord> {
        let record = self.store.create(recipient_id, kind, payload).await?;
        self.publish(&record, Instant::now() + self.publish_timeout).await;
        Ok(record)
    }

    /// Persists the notification, then publishes it to the recipient's topic.
    ///
    /// Fails only when the record could not be stored. An already expired
    /// deadline fails before anything is written; once the insert has
    /// started it runs to completion and the deadline only bounds the
    /// publish.
    pub async fn send_before(
        &self,
        recipient_id: RecipientId,
        kind: &str,
        payload: Payload,
        deadline: Instant,
    ) -> Result<NotificationRecord> {
        if Instant::now() >= deadline {
            return Err(AppError::DeadlineExceeded);
        }

        let record = self.store.create(recipient_id, kind, payload).await?;
        self.publish(&record, deadline).await;
        Ok(record)
    }

    async fn publish(&self, record: &NotificationRecord, deadline: Instant) {
        let topic = topic_for(record.recipient_id);
        let message = BroadcastMessage::from(record);
        let outcome = match tokio::time::timeout_at(deadline, self.broadcaster.publish(&topic, &message)).await {
            Ok(result) => result,
            Err(_) => Err(BroadcastError::TimedOut),
        };

        match outcome {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                info!(notification_id = %record.id, topic = %topic, "Sent notification");
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    notification_id = %record.id,
                    topic = %topic,
                    "Notification stored but broadcast failed: {}",
                    e
                );
            }
        }
    }
}
