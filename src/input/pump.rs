//! Input event pump
//!
//! Drains HAL events one at a time: directional samples become the pending
//! delta in motion state, button releases go to the action dispatcher.

use tokio::sync::{mpsc, watch};
use tracing::{info, trace, warn};

use super::{AxisSample, InputEvent, Normalizer};
use crate::dispatcher::ActionDispatcher;
use crate::motion::MotionHandle;

pub struct InputPump {
    normalizer: Normalizer,
    motion: MotionHandle,
    dispatcher: ActionDispatcher,
}

impl InputPump {
    pub fn new(normalizer: Normalizer, motion: MotionHandle, dispatcher: ActionDispatcher) -> Self {
        Self {
            normalizer,
            motion,
            dispatcher,
        }
    }

    pub async fn handle_event(&self, event: InputEvent) {
        let sample = match event {
            InputEvent::Axis { x, y } => AxisSample::Stick { x, y },
            InputEvent::Hat { x, y } => AxisSample::Hat { x, y },
            InputEvent::ButtonReleased { id } => {
                if let Err(e) = self.dispatcher.on_button_released(id).await {
                    warn!(button = id, "Action not delivered: {}", e);
                }
                return;
            }
        };

        let (dx, dy) = self.normalizer.normalize(sample);
        trace!(?sample, dx, dy, "Delta updated");
        self.motion.set_delta(dx, dy);
    }

    /// Run until shutdown or until the HAL drops its sender
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<InputEvent>, mut shutdown: watch::Receiver<bool>) {
        info!("Input pump started");
        let mut count: u64 = 0;

        loop {
            let event = tokio::select! {
                _ = shutdown.changed() => break,
                ev = events.recv() => match ev {
                    Some(ev) => ev,
                    None => {
                        info!("Input source closed");
                        break;
                    }
                },
            };
            count += 1;
            self.handle_event(event).await;
        }

        info!(events = count, "Input pump stopped");
    }
}
