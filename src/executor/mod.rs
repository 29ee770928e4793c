//! Command executor - the actuator node's receive loop
//!
//! Commands are handled strictly one at a time in arrival order. Every
//! command that decodes gets exactly one feedback message, even when the
//! handler fails; payloads that do not decode get none.

mod handlers;

pub use handlers::HandlerOutcome;

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::actuator::ActuatorDriver;
use crate::bus::{self, BusError, SharedBus, Subscription};
use crate::config::AppConfig;
use crate::protocol::{encode_feedback, Command, Feedback, Point, ProtocolError, Request};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to publish feedback: {0}")]
    Bus(#[from] BusError),
}

/// Handler parameters taken from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    pub speed: f64,
    pub default_volume: f64,
    pub trash: Point,
}

impl ExecutorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            speed: config.actuator.speed,
            default_volume: config.actuator.default_volume,
            trash: Point::new(
                config.actuator.trash_x,
                config.actuator.trash_y,
                config.motion.travel_height,
            ),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct CommandExecutor {
    driver: Arc<dyn ActuatorDriver>,
    bus: SharedBus,
    feedback_channel: String,
    settings: ExecutorSettings,
    handled: u64,
}

impl CommandExecutor {
    pub fn new(
        driver: Arc<dyn ActuatorDriver>,
        bus: SharedBus,
        feedback_channel: impl Into<String>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            driver,
            bus,
            feedback_channel: feedback_channel.into(),
            settings,
            handled: 0,
        }
    }

    /// Run the handler for an already decoded request
    pub async fn handle_request(&self, request: Request) -> HandlerOutcome {
        debug!(driver = self.driver.name(), "Handling {:?}", request);
        handlers::handle(self.driver.as_ref(), &self.settings, request).await
    }

    /// Decode, handle and answer one command payload
    pub async fn handle_message(&mut self, payload: &[u8]) -> Result<Feedback, ExecutorError> {
        let request = Command::decode(payload)?;
        let operation = request.operation();

        let outcome = self.handle_request(request).await;
        self.handled += 1;

        self.bus
            .publish(&self.feedback_channel, Bytes::from(encode_feedback(&outcome.feedback)))
            .await?;

        match &outcome.error {
            None => info!("✅ {} done", operation),
            Some(e) => warn!("{} answered with null feedback after error: {}", operation, e),
        }
        Ok(outcome.feedback)
    }

    /// Serial receive loop until shutdown; a lost subscription is re-established
    pub async fn run(mut self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!(
            channel = subscription.topic(),
            driver = self.driver.name(),
            "Command executor started"
        );

        loop {
            let payload = tokio::select! {
                _ = shutdown.changed() => break,
                msg = subscription.recv() => match msg {
                    Some(payload) => payload,
                    None => {
                        let topic = subscription.topic().to_string();
                        warn!(topic = %topic, "Command subscription lost");
                        match bus::resubscribe(self.bus.as_ref(), &topic, &mut shutdown).await {
                            Some(restored) => {
                                subscription = restored;
                                continue;
                            }
                            None => break,
                        }
                    }
                },
            };

            if let Err(e) = self.handle_message(&payload).await {
                warn!("Rejected command {:?}: {}", String::from_utf8_lossy(&payload), e);
            }
        }

        info!(handled = self.handled, "Command executor stopped");
    }
}
