//! GilRs gamepad provider
//!
//! gilrs is not `Send`, so polling runs on a dedicated OS thread that
//! converts raw events into [`InputEvent`]s and forwards them over a channel
//! to the async input pump.

use anyhow::Result;
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::buttons::{dpad_to_hat, gilrs_button_to_index, is_dpad};
use crate::config::GamepadConfig;
use crate::input::InputEvent;

/// Poll period of the blocking loop
const POLL_INTERVAL: Duration = Duration::from_millis(4);

/// GilRs-based gamepad provider
pub struct GilrsProvider {
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl GilrsProvider {
    /// Start polling gamepads, forwarding events to `event_tx`
    pub fn start(config: &GamepadConfig, event_tx: mpsc::UnboundedSender<InputEvent>) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let product_match = config.product_match.as_ref().map(|p| p.to_lowercase());

        std::thread::Builder::new()
            .name("gamepad-poll".to_string())
            .spawn(move || Self::event_loop_blocking(product_match, event_tx, shutdown_rx))?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Main event loop (runs in dedicated blocking thread)
    fn event_loop_blocking(
        product_match: Option<String>,
        event_tx: mpsc::UnboundedSender<InputEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        // Initialize gilrs in this thread (not Send-safe)
        let mut gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("GilRs initialized");
                g
            }
            Err(e) => {
                warn!("Failed to initialize GilRs: {:?}", e);
                return;
            }
        };

        let mut active: Option<GamepadId> = None;
        for (id, gamepad) in gilrs.gamepads() {
            if Self::matches(gamepad.name(), product_match.as_deref()) {
                info!("🎮 Using gamepad {:?}: \"{}\"", id, gamepad.name());
                active = Some(id);
                break;
            }
        }
        if active.is_none() {
            warn!("⚠️  No matching gamepad connected yet, waiting for hot-plug");
        }

        loop {
            // Check for shutdown signal (non-blocking)
            match shutdown_rx.try_recv() {
                Ok(_) | Err(mpsc::error::TryRecvError::Disconnected) => {
                    info!("Gamepad provider shutting down");
                    break;
                }
                Err(mpsc::error::TryRecvError::Empty) => {}
            }

            while let Some(Event { id, event, .. }) = gilrs.next_event() {
                match event {
                    EventType::Connected if active.is_none() => {
                        let name = gilrs.gamepad(id).name().to_string();
                        if Self::matches(&name, product_match.as_deref()) {
                            info!("🎮 Gamepad connected {:?}: \"{}\"", id, name);
                            active = Some(id);
                        }
                        continue;
                    }
                    EventType::Disconnected if active == Some(id) => {
                        warn!("Gamepad {:?} disconnected", id);
                        active = None;
                        continue;
                    }
                    _ => {}
                }

                if active != Some(id) {
                    continue;
                }

                if let Some(input) = Self::convert_event(&gilrs, id, event) {
                    debug!("Gamepad event: {:?}", input);
                    if event_tx.send(input).is_err() {
                        warn!("Event receiver dropped, shutting down gamepad loop");
                        return;
                    }
                }
            }

            // Sleep briefly to avoid busy-waiting
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn matches(name: &str, product_match: Option<&str>) -> bool {
        match product_match {
            Some(pattern) => name.to_lowercase().contains(pattern),
            None => true,
        }
    }

    /// Convert a gilrs event into an input event
    ///
    /// Stick motion reports both axes of the left stick, read after the
    /// event was applied, so a single-axis change still yields a full sample.
    fn convert_event(gilrs: &Gilrs, id: GamepadId, event: EventType) -> Option<InputEvent> {
        let gamepad = gilrs.gamepad(id);
        match event {
            EventType::ButtonPressed(button, _) | EventType::ButtonReleased(button, _) if is_dpad(button) => {
                Some(Self::hat_from_dpad(gilrs, id))
            }
            EventType::ButtonReleased(button, _) => {
                gilrs_button_to_index(button).map(|index| InputEvent::ButtonReleased { id: index })
            }
            EventType::AxisChanged(Axis::LeftStickX | Axis::LeftStickY, _, _) => Some(InputEvent::Axis {
                x: gamepad.value(Axis::LeftStickX),
                y: gamepad.value(Axis::LeftStickY),
            }),
            // Some pads expose the hat as a pair of axes
            EventType::AxisChanged(Axis::DPadX | Axis::DPadY, _, _) => Some(InputEvent::Hat {
                x: gamepad.value(Axis::DPadX).round() as i8,
                y: gamepad.value(Axis::DPadY).round() as i8,
            }),
            _ => None,
        }
    }

    fn hat_from_dpad(gilrs: &Gilrs, id: GamepadId) -> InputEvent {
        let gamepad = gilrs.gamepad(id);
        let (x, y) = dpad_to_hat(
            gamepad.is_pressed(Button::DPadUp),
            gamepad.is_pressed(Button::DPadDown),
            gamepad.is_pressed(Button::DPadLeft),
            gamepad.is_pressed(Button::DPadRight),
        );
        InputEvent::Hat { x, y }
    }

    /// Stop the polling thread
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
            info!("Gamepad provider shutdown requested");
        }
    }
}

impl Drop for GilrsProvider {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }
}
