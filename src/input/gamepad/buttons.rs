//! Button numbering for gilrs controllers
//!
//! The command protocol identifies buttons by the joystick index an SDL-style
//! driver reports for an Xbox layout: A=0, B=1, X=2, Y=3. gilrs reports
//! buttons by physical position, so positions are mapped to those indices.
//!
//! ```text
//!        [3/North]
//!   [2/West]   [1/East]
//!        [0/South]
//! ```

use gilrs::Button;

/// Map a gilrs button to its joystick index
///
/// Returns `None` for D-pad buttons (reported as a hat instead) and for
/// buttons without a stable index.
pub fn gilrs_button_to_index(button: Button) -> Option<u8> {
    match button {
        // Face buttons
        Button::South => Some(0),
        Button::East => Some(1),
        Button::West => Some(2),
        Button::North => Some(3),

        // Shoulders
        Button::LeftTrigger => Some(4),
        Button::RightTrigger => Some(5),

        // Menu buttons
        Button::Select => Some(6),
        Button::Start => Some(7),

        // Stick clicks
        Button::LeftThumb => Some(8),
        Button::RightThumb => Some(9),
        Button::Mode => Some(10),

        _ => None,
    }
}

/// Whether the button belongs to the D-pad
pub fn is_dpad(button: Button) -> bool {
    matches!(
        button,
        Button::DPadUp | Button::DPadDown | Button::DPadLeft | Button::DPadRight
    )
}

/// Hat position from the pressed state of the four D-pad buttons
///
/// Up and right are positive. Opposite directions held together cancel out.
pub fn dpad_to_hat(up: bool, down: bool, left: bool, right: bool) -> (i8, i8) {
    let x = i8::from(right) - i8::from(left);
    let y = i8::from(up) - i8::from(down);
    (x, y)
}
