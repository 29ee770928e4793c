//! In-process bus over tokio broadcast channels
//!
//! Used when both nodes run in one process and by tests. Each topic is a
//! broadcast channel created on first use; every subscription gets its own
//! forwarding task so a slow subscriber never blocks a publisher.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

use super::{Bus, BusError, Subscription, SUBSCRIPTION_CAPACITY};

/// Broadcast buffer per topic; a subscriber further behind than this loses messages
const TOPIC_CAPACITY: usize = 1024;

#[derive(Clone, Default)]
pub struct LocalBus {
    topics: Arc<DashMap<String, broadcast::Sender<Bytes>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Bytes> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    /// Number of live subscriptions on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Bus for LocalBus {
    fn name(&self) -> &str {
        "local"
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError> {
        match self.sender(topic).send(payload) {
            Ok(receivers) => trace!(topic, receivers, "Published"),
            // No subscriber: the message is dropped, as with any live pub/sub
            Err(_) => debug!(topic, "Published with no subscribers"),
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        // Register the broadcast receiver before returning so nothing
        // published after this call can be missed
        let mut broadcast_rx = self.sender(topic).subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let topic_name = topic.to_string();

        tokio::spawn(async move {
            loop {
                // A dropped Subscription ends the task without waiting for traffic
                let msg = tokio::select! {
                    _ = tx.closed() => break,
                    msg = broadcast_rx.recv() => msg,
                };
                match msg {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic_name, skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!(topic = %topic_name, "Local subscription closed");
        });

        debug!(topic, "Subscribed on local bus");
        Ok(Subscription::new(topic, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_publish_reaches_subscriber_in_order() {
        let bus = LocalBus::new();
        let mut sub = bus.subscribe("cmd").await.unwrap();
        assert_eq!(sub.topic(), "cmd");

        for i in 0..5u8 {
            bus.publish("cmd", Bytes::from(vec![i])).await.unwrap();
        }

        for i in 0..5u8 {
            let msg = timeout(Duration::from_secs(1), sub.recv()).await.unwrap().unwrap();
            assert_eq!(msg.as_ref(), &[i]);
        }
    }

    #[tokio::test]
    async fn test_topics_are_independent() {
        let bus = LocalBus::new();
        let mut cmd = bus.subscribe("cmd").await.unwrap();
        let mut fb = bus.subscribe("fb").await.unwrap();

        bus.publish("fb", Bytes::from_static(b"feedback")).await.unwrap();
        bus.publish("cmd", Bytes::from_static(b"command")).await.unwrap();

        let got = timeout(Duration::from_secs(1), cmd.recv()).await.unwrap().unwrap();
        assert_eq!(got.as_ref(), b"command");
        let got = timeout(Duration::from_secs(1), fb.recv()).await.unwrap().unwrap();
        assert_eq!(got.as_ref(), b"feedback");
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_messages() {
        let bus = LocalBus::new();
        bus.publish("cmd", Bytes::from_static(b"early")).await.unwrap();

        let mut sub = bus.subscribe("cmd").await.unwrap();
        bus.publish("cmd", Bytes::from_static(b"late")).await.unwrap();

        let got = timeout(Duration::from_secs(1), sub.recv()).await.unwrap().unwrap();
        assert_eq!(got.as_ref(), b"late");
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_a_copy() {
        let bus = LocalBus::new();
        let mut a = bus.subscribe("cmd").await.unwrap();
        let mut b = bus.subscribe("cmd").await.unwrap();
        assert_eq!(bus.subscriber_count("cmd"), 2);

        bus.publish("cmd", Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(timeout(Duration::from_secs(1), a.recv()).await.unwrap().unwrap().as_ref(), b"x");
        assert_eq!(timeout(Duration::from_secs(1), b.recv()).await.unwrap().unwrap().as_ref(), b"x");
    }

    #[tokio::test]
    async fn test_dropped_subscription_releases_topic_receiver() {
        let bus = LocalBus::new();
        let sub = bus.subscribe("cmd").await.unwrap();
        assert_eq!(bus.subscriber_count("cmd"), 1);

        drop(sub);
        // No publish happens; the forwarder must notice on its own
        timeout(Duration::from_secs(1), async {
            while bus.subscriber_count("cmd") > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = LocalBus::new();
        assert!(bus.publish("nobody", Bytes::from_static(b"x")).await.is_ok());
        assert_eq!(bus.subscriber_count("nobody"), 0);
    }
}
