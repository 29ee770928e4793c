//! Gamepad input support using GilRs

pub mod buttons;
pub mod diagnostics;
pub mod provider;

pub use diagnostics::print_gamepad_diagnostics;
pub use provider::GilrsProvider;
