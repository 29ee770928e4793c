//! Pipette GW - drive a liquid-handling robot from a gamepad
//!
//! The input node turns joystick samples into debounced `Move` commands and
//! button releases into pipetting actions. The actuator node executes those
//! commands and answers each one on a feedback channel.

pub mod actuator;
pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod feedback;
pub mod input;
pub mod motion;
pub mod navigation;
pub mod node;
pub mod protocol;
