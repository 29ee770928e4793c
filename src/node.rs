//! Node composition
//!
//! Wires the components of each node together and runs them until the shared
//! shutdown signal fires. Both nodes only talk to each other through the bus,
//! so they can run in separate processes (Redis) or side by side in one
//! process (`LocalBus`).

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::actuator::ActuatorDriver;
use crate::bus::{SharedBus, Subscription};
use crate::config::AppConfig;
use crate::dispatcher::ActionDispatcher;
use crate::executor::{CommandExecutor, ExecutorSettings};
use crate::feedback::{FeedbackListener, FeedbackSignal};
use crate::input::{InputEvent, InputPump, Normalizer};
use crate::motion::{MotionHandle, MotionState};
use crate::navigation::NavigationLoop;

/// Sender/receiver pair for the process-wide shutdown flag
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Joystick side: motion state, navigation loop, dispatcher, feedback listener
pub struct InputNode {
    config: AppConfig,
    bus: SharedBus,
}

impl InputNode {
    pub fn new(config: AppConfig, bus: SharedBus) -> Self {
        Self { config, bus }
    }

    /// Run until shutdown
    ///
    /// The feedback subscription is established before anything can publish
    /// a command, so no answer is missed on transports without replay.
    pub async fn run(self, events: mpsc::UnboundedReceiver<InputEvent>, shutdown: watch::Receiver<bool>) -> Result<()> {
        let config = &self.config;
        let motion = MotionHandle::spawn(MotionState::from_config(config));
        let signal = FeedbackSignal::new();

        let mut listener = FeedbackListener::new(self.bus.clone(), config.bus.feedback_channel.clone(), signal.clone());
        if config.motion.sync_position {
            listener = listener.with_position_sync(motion.clone());
        }
        let feedback_sub = listener
            .subscribe()
            .await
            .with_context(|| format!("Failed to subscribe to '{}'", config.bus.feedback_channel))?;

        let navigation = NavigationLoop::new(
            motion.clone(),
            self.bus.clone(),
            config.bus.command_channel.clone(),
            Duration::from_millis(config.motion.tick_ms),
        );
        let dispatcher = ActionDispatcher::from_config(config, motion.clone(), self.bus.clone(), signal);
        let pump = InputPump::new(Normalizer::from_config(&config.motion), motion.clone(), dispatcher);

        info!(
            bus = self.bus.name(),
            commands = %config.bus.command_channel,
            feedback = %config.bus.feedback_channel,
            "🕹️  Input node running"
        );

        let listener_task = tokio::spawn(listener.run(feedback_sub, shutdown.clone()));
        let navigation_task = tokio::spawn(navigation.run(shutdown.clone()));
        pump.run(events, shutdown).await;

        // The pump also ends when the input source goes away; keep navigating
        // until the shutdown signal in that case
        for (name, task) in [("navigation", navigation_task), ("feedback", listener_task)] {
            if let Err(e) = task.await {
                warn!("{} task ended abnormally: {}", name, e);
            }
        }

        motion.shutdown();
        info!("Input node stopped");
        Ok(())
    }
}

/// Robot side: command executor over an actuator driver
pub struct ActuatorNode {
    config: AppConfig,
    bus: SharedBus,
    driver: Arc<dyn ActuatorDriver>,
}

impl ActuatorNode {
    pub fn new(config: AppConfig, bus: SharedBus, driver: Arc<dyn ActuatorDriver>) -> Self {
        Self { config, bus, driver }
    }

    /// Home the driver and subscribe to the command channel
    ///
    /// Once this returns, commands published on the bus are queued for the
    /// executor even before [`ActuatorRunner::run`] is polled.
    pub async fn start(self) -> Result<ActuatorRunner> {
        let channel = self.config.bus.command_channel.clone();

        if let Err(e) = self.driver.home().await {
            warn!("Homing failed, continuing: {}", e);
        }

        let subscription = self
            .bus
            .subscribe(&channel)
            .await
            .with_context(|| format!("Failed to subscribe to '{}'", channel))?;

        let executor = CommandExecutor::new(
            self.driver,
            self.bus,
            self.config.bus.feedback_channel.clone(),
            ExecutorSettings::from_config(&self.config),
        );

        Ok(ActuatorRunner { executor, subscription })
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.start().await?.run(shutdown).await;
        Ok(())
    }
}

/// Actuator node that is subscribed and ready to execute
pub struct ActuatorRunner {
    executor: CommandExecutor,
    subscription: Subscription,
}

impl ActuatorRunner {
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!("🤖 Actuator node running");
        self.executor.run(self.subscription, shutdown).await;
        info!("Actuator node stopped");
    }
}
