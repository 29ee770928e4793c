//! Gamepad diagnostics for troubleshooting detection and button numbering

use gilrs::{Axis, Button, Event, EventType, Gilrs};
use std::thread;
use std::time::Duration;
use tracing::info;

use super::buttons::gilrs_button_to_index;

/// Print every detected gamepad with its current button/axis state
///
/// Useful to find the `product_match` string and to check which joystick
/// index a physical button maps to.
pub fn print_gamepad_diagnostics() {
    info!("=== Gamepad Diagnostics ===");
    info!("Platform: {}", std::env::consts::OS);

    let mut gilrs = match Gilrs::new() {
        Ok(g) => {
            info!("✅ gilrs initialized successfully");
            g
        }
        Err(e) => {
            info!("❌ Failed to initialize GilRs: {:?}", e);
            info!("This may indicate missing system libraries or permissions issues.");
            return;
        }
    };

    info!("⏳ Waiting for gamepads to connect (3 seconds)...");
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(3) {
        while let Some(Event { event, .. }) = gilrs.next_event() {
            if event == EventType::Connected {
                info!("   📶 Gamepad connection detected...");
            }
        }
        thread::sleep(Duration::from_millis(100));
    }

    let gamepads: Vec<_> = gilrs.gamepads().collect();
    if gamepads.is_empty() {
        info!("⚠️  No gamepads detected");
        return;
    }

    info!("✅ Found {} gamepad(s):", gamepads.len());
    for (id, gamepad) in gamepads {
        info!("📋 Gamepad ID: {:?}", id);
        info!("   Name: \"{}\"", gamepad.name());
        info!("   Connected: {}", gamepad.is_connected());
        info!("   Config pattern suggestion: product_match: \"{}\"", gamepad.name());

        for button in [Button::South, Button::East, Button::West, Button::North] {
            let index = gilrs_button_to_index(button).unwrap_or(u8::MAX);
            let state = if gamepad.is_pressed(button) { "PRESSED" } else { "released" };
            info!("   Button {:?} -> index {}: {}", button, index, state);
        }

        for axis in [Axis::LeftStickX, Axis::LeftStickY] {
            info!("   {:?}: {:.3}", axis, gamepad.value(axis));
        }
    }

    info!("=== End Diagnostics ===");
    info!("💡 Button indices 0-3 trigger Aspirate, Dispense, Eject, Pick on release");
}
