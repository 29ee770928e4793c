//! Navigation loop - periodic, debounced move publisher
//!
//! Each tick applies whatever delta is pending in the motion state and
//! publishes at most one `Move`. Input events arriving between ticks only
//! overwrite the pending delta, which bounds the command rate to one per
//! interval.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::bus::{BusError, SharedBus};
use crate::motion::MotionHandle;
use crate::protocol::{Command, Point};

pub struct NavigationLoop {
    motion: MotionHandle,
    bus: SharedBus,
    channel: String,
    interval: Duration,
}

impl NavigationLoop {
    pub fn new(motion: MotionHandle, bus: SharedBus, channel: impl Into<String>, interval: Duration) -> Self {
        Self {
            motion,
            bus,
            channel: channel.into(),
            interval,
        }
    }

    /// Run one step
    ///
    /// Returns the published target, `None` for blocked, idle or fully
    /// clamped ticks. The delta is consumed before publishing, so a failed
    /// publish loses that step and the next tick starts from the new target.
    pub async fn tick(&self) -> Result<Option<Point>, BusError> {
        let Some(target) = self.motion.advance().await else {
            return Ok(None);
        };

        let payload = Bytes::from(Command::move_to(target).encode());
        self.bus.publish(&self.channel, payload).await?;
        debug!("➡️  Move {}", target);
        Ok(Some(target))
    }

    /// Tick until shutdown; publish errors are logged and the loop continues
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Navigation loop started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut moves: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(Some(_)) => moves += 1,
                        Ok(None) => {}
                        Err(e) => warn!("Failed to publish move: {}", e),
                    }
                }
            }
        }

        info!(moves, "Navigation loop stopped");
    }
}
