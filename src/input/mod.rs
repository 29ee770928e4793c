//! Input side of the input node: HAL events, normalization, and the event pump

pub mod gamepad;
pub mod normalize;
pub mod pump;

pub use normalize::{axis_to_step, AxisSample, Normalizer};
pub use pump::InputPump;

/// Event produced by the input HAL
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Analog stick sample, each axis in [-1.0, 1.0]
    Axis { x: f32, y: f32 },
    /// Hat / D-pad position, each axis in {-1, 0, 1}
    Hat { x: i8, y: i8 },
    /// Button released (fires once per press, not while held)
    ButtonReleased { id: u8 },
}
