//! Redis PUBLISH/SUBSCRIBE transport
//!
//! Publishing shares one multiplexed connection; every subscription opens a
//! dedicated pub/sub connection whose message stream is forwarded into the
//! subscription queue by a background task.

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, trace, warn};

use super::{Bus, BusError, Subscription, SUBSCRIPTION_CAPACITY};

impl From<redis::RedisError> for BusError {
    fn from(e: redis::RedisError) -> Self {
        BusError::Transport(e.to_string())
    }
}

pub struct RedisBus {
    client: redis::Client,
    publisher: redis::aio::MultiplexedConnection,
}

impl RedisBus {
    /// Open the broker connection used for publishing
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        info!("Connecting to Redis broker at {}", url);

        let client = redis::Client::open(url)?;
        let publisher = client.get_multiplexed_async_connection().await?;

        info!("✅ Connected to Redis broker");
        Ok(Self {
            client,
            publisher,
        })
    }
}

#[async_trait]
impl Bus for RedisBus {
    fn name(&self) -> &str {
        "redis"
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(topic, &payload[..]).await?;

        if receivers == 0 {
            debug!(topic, "Published with no subscribers");
        } else {
            trace!(topic, receivers, "Published");
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        // Awaiting the SUBSCRIBE reply means later publishes are delivered
        pubsub.subscribe(topic).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let topic_name = topic.to_string();

        tokio::spawn(async move {
            let mut messages = Box::pin(pubsub.into_on_message());
            while let Some(msg) = messages.next().await {
                let payload = Bytes::copy_from_slice(msg.get_payload_bytes());
                if tx.send(payload).await.is_err() {
                    debug!(topic = %topic_name, "Subscription dropped, closing Redis stream");
                    return;
                }
            }
            warn!(topic = %topic_name, "Redis pub/sub stream ended");
        });

        info!(topic, "Subscribed on Redis bus");
        Ok(Subscription::new(topic, rx))
    }
}
