//! Action dispatcher - button releases to actuator operations
//!
//! Each recognized release publishes exactly one action command while the
//! navigation loop is blocked. With the default policy the block is lifted as
//! soon as the publish returns, so it only keeps a `Move` from racing the
//! publish; it does not cover the physical action itself.

use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bus::{BusError, SharedBus};
use crate::config::{AppConfig, BlockPolicy};
use crate::feedback::FeedbackSignal;
use crate::motion::MotionHandle;
use crate::protocol::{Command, Operation};

/// Static button map
pub fn operation_for_button(id: u8) -> Option<Operation> {
    match id {
        0 => Some(Operation::Aspirate),
        1 => Some(Operation::Dispense),
        2 => Some(Operation::Eject),
        3 => Some(Operation::Pick),
        _ => None,
    }
}

pub struct ActionDispatcher {
    motion: MotionHandle,
    bus: SharedBus,
    channel: String,
    policy: BlockPolicy,
    feedback: FeedbackSignal,
    feedback_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(
        motion: MotionHandle,
        bus: SharedBus,
        channel: impl Into<String>,
        feedback: FeedbackSignal,
    ) -> Self {
        Self {
            motion,
            bus,
            channel: channel.into(),
            policy: BlockPolicy::ReleaseAfterPublish,
            feedback,
            feedback_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        motion: MotionHandle,
        bus: SharedBus,
        feedback: FeedbackSignal,
    ) -> Self {
        Self::new(motion, bus, config.bus.command_channel.clone(), feedback).with_policy(
            config.motion.block_policy,
            Duration::from_millis(config.motion.feedback_timeout_ms),
        )
    }

    pub fn with_policy(mut self, policy: BlockPolicy, feedback_timeout: Duration) -> Self {
        self.policy = policy;
        self.feedback_timeout = feedback_timeout;
        self
    }

    /// Handle a button release
    ///
    /// Returns the published operation, or `None` for unmapped buttons. The
    /// block is always lifted again, even when the publish fails.
    pub async fn on_button_released(&self, id: u8) -> Result<Option<Operation>, BusError> {
        let Some(op) = operation_for_button(id) else {
            debug!(button = id, "Ignoring unmapped button");
            return Ok(None);
        };

        let seen = self.feedback.count();
        self.motion.set_blocked(true).await;

        let payload = Bytes::from(Command::action(op).encode());
        let result = self.bus.publish(&self.channel, payload).await;

        match &result {
            Ok(()) => {
                info!(button = id, "🎯 Published {}", op);
                if self.policy == BlockPolicy::UntilFeedback
                    && !self.feedback.wait_after(seen, self.feedback_timeout).await
                {
                    warn!(
                        "No feedback for {} within {:?}, releasing navigation",
                        op, self.feedback_timeout
                    );
                }
            }
            Err(e) => warn!("Failed to publish {}: {}", op, e),
        }

        self.motion.set_blocked(false).await;
        result.map(|()| Some(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Bus, LocalBus, Subscription};
    use crate::motion::{MotionState, WorkspaceBounds};
    use crate::protocol::Request;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn motion() -> MotionHandle {
        let bounds = WorkspaceBounds { min_x: 0, max_x: 400, min_y: 0, max_y: 400 };
        MotionHandle::spawn(MotionState::new(bounds, 100, 100, 100))
    }

    /// Bus that records the block flag seen at publish time
    struct RecordingBus {
        motion: MotionHandle,
        blocked_at_publish: parking_lot::Mutex<Vec<bool>>,
        fail: bool,
    }

    #[async_trait]
    impl Bus for RecordingBus {
        fn name(&self) -> &str {
            "recording"
        }

        async fn publish(&self, _topic: &str, _payload: Bytes) -> Result<(), BusError> {
            let blocked = self.motion.is_blocked().await;
            self.blocked_at_publish.lock().push(blocked);
            if self.fail {
                Err(BusError::Transport("broker down".to_string()))
            } else {
                Ok(())
            }
        }

        async fn subscribe(&self, _topic: &str) -> Result<Subscription, BusError> {
            Err(BusError::Closed)
        }
    }

    #[test]
    fn test_button_map() {
        assert_eq!(operation_for_button(0), Some(Operation::Aspirate));
        assert_eq!(operation_for_button(1), Some(Operation::Dispense));
        assert_eq!(operation_for_button(2), Some(Operation::Eject));
        assert_eq!(operation_for_button(3), Some(Operation::Pick));
        assert_eq!(operation_for_button(4), None);
        assert_eq!(operation_for_button(255), None);
    }

    #[tokio::test]
    async fn test_pick_button_publishes_one_command_and_unblocks() {
        let bus = Arc::new(LocalBus::new());
        let mut sub = bus.subscribe("cmd").await.unwrap();
        let motion = motion();
        let dispatcher = ActionDispatcher::new(motion.clone(), bus.clone(), "cmd", FeedbackSignal::new());

        let op = dispatcher.on_button_released(3).await.unwrap();
        assert_eq!(op, Some(Operation::Pick));
        assert!(!motion.is_blocked().await);

        let payload = tokio::time::timeout(Duration::from_secs(1), sub.recv()).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value, serde_json::json!({"op": "Pick", "d": {}}));
        assert_eq!(Command::decode(&payload).unwrap(), Request::Pick);

        // Exactly one command
        assert!(tokio::time::timeout(Duration::from_millis(50), sub.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_button_is_noop() {
        let bus = Arc::new(LocalBus::new());
        let mut sub = bus.subscribe("cmd").await.unwrap();
        let dispatcher = ActionDispatcher::new(motion(), bus.clone(), "cmd", FeedbackSignal::new());

        assert_eq!(dispatcher.on_button_released(9).await.unwrap(), None);
        assert!(tokio::time::timeout(Duration::from_millis(50), sub.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_navigation_is_blocked_during_publish() {
        let motion = motion();
        let bus = Arc::new(RecordingBus {
            motion: motion.clone(),
            blocked_at_publish: parking_lot::Mutex::new(Vec::new()),
            fail: false,
        });
        let dispatcher = ActionDispatcher::new(motion.clone(), bus.clone(), "cmd", FeedbackSignal::new());

        dispatcher.on_button_released(0).await.unwrap();
        assert_eq!(*bus.blocked_at_publish.lock(), vec![true]);
        assert!(!motion.is_blocked().await);
    }

    #[tokio::test]
    async fn test_block_released_when_publish_fails() {
        let motion = motion();
        let bus = Arc::new(RecordingBus {
            motion: motion.clone(),
            blocked_at_publish: parking_lot::Mutex::new(Vec::new()),
            fail: true,
        });
        let dispatcher = ActionDispatcher::new(motion.clone(), bus, "cmd", FeedbackSignal::new());

        assert!(dispatcher.on_button_released(1).await.is_err());
        assert!(!motion.is_blocked().await);
    }

    #[tokio::test]
    async fn test_until_feedback_policy_holds_block() {
        let motion = motion();
        let bus = Arc::new(LocalBus::new());
        let signal = FeedbackSignal::new();
        let dispatcher = Arc::new(
            ActionDispatcher::new(motion.clone(), bus, "cmd", signal.clone())
                .with_policy(BlockPolicy::UntilFeedback, Duration::from_secs(5)),
        );

        let d = dispatcher.clone();
        let task = tokio::spawn(async move { d.on_button_released(2).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(motion.is_blocked().await);

        signal.notify();
        assert_eq!(task.await.unwrap().unwrap(), Some(Operation::Eject));
        assert!(!motion.is_blocked().await);
    }

    #[tokio::test]
    async fn test_until_feedback_policy_times_out() {
        let motion = motion();
        let dispatcher = ActionDispatcher::new(motion.clone(), Arc::new(LocalBus::new()), "cmd", FeedbackSignal::new())
            .with_policy(BlockPolicy::UntilFeedback, Duration::from_millis(30));

        assert_eq!(dispatcher.on_button_released(0).await.unwrap(), Some(Operation::Aspirate));
        assert!(!motion.is_blocked().await);
    }
}
