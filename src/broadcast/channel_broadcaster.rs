use async_trait::async_trait;
use futures::stream::Stream;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use super::broadcaster::{BroadcastError, BroadcastMessage, Broadcaster};

#[derive(Debug, Clone)]
pub struct TopicMessage {
    pub topic: String,
    pub message: BroadcastMessage,
}

/// In-process pub/sub bus backed by a tokio broadcast channel. Every
/// subscriber sees every publish and keeps only its own topic.
#[derive(Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<TopicMessage>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Messages published to `topic` from now on. Events missed because the
    /// subscriber lagged are skipped.
    pub fn subscribe(&self, topic: String) -> impl Stream<Item = BroadcastMessage> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |result| match result {
            Ok(TopicMessage { topic: t, message }) if t == topic => Some(message),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(topic = %topic, "subscriber lagged: {}", e);
                None
            }
        })
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn publish(&self, topic: &str, message: &BroadcastMessage) -> Result<(), BroadcastError> {
        let envelope = TopicMessage {
            topic: topic.to_string(),
            message: message.clone(),
        };

        match self.tx.send(envelope) {
            Ok(receivers) => tracing::debug!(topic, receivers, "notification event published"),
            // Nobody listening is not a transport failure
            Err(_) => tracing::debug!(topic, "no subscribers for notification event"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::broadcaster::topic_for;
    use crate::notification::notification_models::Payload;
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;

    fn message(msg: &str) -> BroadcastMessage {
        BroadcastMessage {
            id: Uuid::new_v4(),
            kind: "system".to_string(),
            payload: Payload::new().with("msg", msg),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_only_sees_its_topic() {
        let bus = ChannelBroadcaster::new(16);
        let mut stream = Box::pin(bus.subscribe(topic_for(42)));

        let other = message("not for you");
        let mine = message("hello");
        bus.publish(&topic_for(7), &other).await.unwrap();
        bus.publish(&topic_for(42), &mine).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, mine);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let bus = ChannelBroadcaster::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.publish(&topic_for(1), &message("nobody")).await.is_ok());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let bus = ChannelBroadcaster::new(1);
        let mut stream = Box::pin(bus.subscribe(topic_for(1)));

        bus.publish(&topic_for(1), &message("dropped")).await.unwrap();
        let last = message("kept");
        bus.publish(&topic_for(1), &last).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, last);
    }
}
