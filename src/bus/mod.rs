//! Command bus - publish/subscribe transport between the two nodes
//!
//! Two logical topics ride on the bus: the command channel (input node →
//! actuator node) and the feedback channel (actuator node → input node).
//! Delivery is at-most-once to subscribers that exist at publish time, FIFO
//! per topic, with no persistence or replay.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

pub mod local;
pub mod redis_bus;

pub use local::LocalBus;
pub use redis_bus::RedisBus;

/// Capacity of the per-subscription delivery queue
pub const SUBSCRIPTION_CAPACITY: usize = 256;

/// First delay before re-subscribing after a stream ended
pub const RESUBSCRIBE_INITIAL_DELAY: Duration = Duration::from_millis(200);

/// Upper bound of the exponential re-subscribe backoff
pub const RESUBSCRIBE_MAX_DELAY: Duration = Duration::from_secs(10);

/// Transport failures
#[derive(Debug, Error)]
pub enum BusError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("bus closed")]
    Closed,
}

/// Pub/sub transport
///
/// Implementations must preserve publish order per topic for a given
/// publisher/subscriber pair.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Fire-and-forget publish. A topic without subscribers is not an error.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError>;

    /// Start receiving messages published on `topic` from now on
    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;
}

/// Shared bus handle used across tasks
pub type SharedBus = Arc<dyn Bus>;

/// Long-lived receive side of a subscription
pub struct Subscription {
    topic: String,
    rx: mpsc::Receiver<Bytes>,
}

impl Subscription {
    pub(crate) fn new(topic: impl Into<String>, rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message; `None` once the transport side is gone
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

/// Connect the transport selected by configuration
///
/// A configured URL selects Redis; otherwise an in-process bus is returned,
/// which only links nodes running in the same process.
pub async fn connect(url: Option<&str>) -> Result<SharedBus, BusError> {
    match url {
        Some(url) => Ok(Arc::new(RedisBus::connect(url).await?)),
        None => Ok(Arc::new(LocalBus::new())),
    }
}

/// Subscribe again after a subscription's stream ended
///
/// Retries with exponential backoff until the transport accepts the
/// subscription. Returns `None` only when `shutdown` fires first.
pub async fn resubscribe(
    bus: &dyn Bus,
    topic: &str,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Subscription> {
    let mut delay = RESUBSCRIBE_INITIAL_DELAY;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        warn!(topic, attempt, "⏳ Re-subscribing in {}ms", delay.as_millis());

        tokio::select! {
            _ = shutdown.changed() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        match bus.subscribe(topic).await {
            Ok(subscription) => {
                info!(topic, attempt, "✅ Subscription restored on {} bus", bus.name());
                return Some(subscription);
            }
            Err(e) => {
                warn!(topic, "Re-subscribe failed: {}", e);
                delay = (delay * 2).min(RESUBSCRIBE_MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Bus whose first `failures` subscribe calls fail
    struct FlakyBus {
        inner: LocalBus,
        failures: Mutex<u32>,
    }

    #[async_trait]
    impl Bus for FlakyBus {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError> {
            self.inner.publish(topic, payload).await
        }

        async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
            {
                let mut failures = self.failures.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(BusError::Transport("connection refused".to_string()));
                }
            }
            self.inner.subscribe(topic).await
        }
    }

    #[tokio::test]
    async fn test_resubscribe_retries_until_transport_accepts() {
        let bus = FlakyBus {
            inner: LocalBus::new(),
            failures: Mutex::new(2),
        };
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let mut sub = tokio::time::timeout(
            Duration::from_secs(5),
            resubscribe(&bus, "cmd", &mut shutdown_rx),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(*bus.failures.lock(), 0);

        bus.publish("cmd", Bytes::from_static(b"after")).await.unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), sub.recv()).await.unwrap().unwrap();
        assert_eq!(got.as_ref(), b"after");
    }

    #[tokio::test]
    async fn test_resubscribe_gives_up_on_shutdown() {
        let bus = FlakyBus {
            inner: LocalBus::new(),
            failures: Mutex::new(u32::MAX),
        };
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move { resubscribe(&bus, "cmd", &mut shutdown_rx).await.is_none() });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        assert!(tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap());
    }
}
