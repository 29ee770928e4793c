//! Feedback listener - consumes completion reports from the actuator node
//!
//! Feedback carries no correlation id; messages are only counted in arrival
//! order. The count is exposed through [`FeedbackSignal`] so the action
//! dispatcher can hold the navigation block until the next report arrives.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bus::{self, BusError, SharedBus, Subscription};
use crate::motion::MotionHandle;
use crate::protocol::{decode_feedback, Feedback, ProtocolError};

/// Monotonic counter of received feedback messages
#[derive(Clone)]
pub struct FeedbackSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for FeedbackSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Record one feedback arrival
    pub fn notify(&self) {
        self.tx.send_modify(|count| *count += 1);
    }

    pub fn count(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Wait until the count exceeds `seen`; `false` on timeout
    pub async fn wait_after(&self, seen: u64, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let arrived = tokio::time::timeout(timeout, rx.wait_for(|count| *count > seen))
            .await
            .map(|waited| waited.is_ok())
            .unwrap_or(false);
        arrived
    }
}

pub struct FeedbackListener {
    bus: SharedBus,
    channel: String,
    signal: FeedbackSignal,
    /// When set, positional feedback overwrites the navigation target
    sync_target: Option<MotionHandle>,
    last: Option<Feedback>,
}

impl FeedbackListener {
    pub fn new(bus: SharedBus, channel: impl Into<String>, signal: FeedbackSignal) -> Self {
        Self {
            bus,
            channel: channel.into(),
            signal,
            sync_target: None,
            last: None,
        }
    }

    /// Adopt positions reported by the actuator as the new target
    pub fn with_position_sync(mut self, motion: MotionHandle) -> Self {
        self.sync_target = Some(motion);
        self
    }

    pub async fn subscribe(&self) -> Result<Subscription, BusError> {
        self.bus.subscribe(&self.channel).await
    }

    /// Most recent decoded feedback
    pub fn last(&self) -> Option<Feedback> {
        self.last
    }

    /// Decode and act on one feedback payload
    pub fn handle_payload(&mut self, payload: &[u8]) -> Result<Feedback, ProtocolError> {
        let feedback = decode_feedback(payload)?;

        match feedback {
            Some(point) => {
                info!("📥 Feedback: position {}", point);
                if let Some(motion) = &self.sync_target {
                    motion.set_position(point.x, point.y);
                }
            }
            None => debug!("📥 Feedback: no result"),
        }

        self.last = Some(feedback);
        self.signal.notify();
        Ok(feedback)
    }

    /// Receive loop until shutdown; malformed feedback is logged and skipped
    pub async fn run(mut self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!(channel = %self.channel, "Feedback listener started");

        loop {
            let payload: Bytes = tokio::select! {
                _ = shutdown.changed() => break,
                msg = subscription.recv() => match msg {
                    Some(payload) => payload,
                    None => {
                        warn!(channel = %self.channel, "Feedback subscription lost");
                        match bus::resubscribe(self.bus.as_ref(), &self.channel, &mut shutdown).await {
                            Some(restored) => {
                                subscription = restored;
                                continue;
                            }
                            None => break,
                        }
                    }
                },
            };

            if let Err(e) = self.handle_payload(&payload) {
                warn!("Dropping malformed feedback {:?}: {}", String::from_utf8_lossy(&payload), e);
            }
        }

        info!(received = self.signal.count(), "Feedback listener stopped");
    }
}
