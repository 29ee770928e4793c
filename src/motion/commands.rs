//! Command enum for the motion actor
//!
//! Hot-path writes are fire-and-forget; reads and the navigation tick answer
//! through a oneshot channel.

use super::types::MotionSnapshot;
use crate::protocol::Point;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum MotionCommand {
    // -------------------------------------------------------------------------
    // Hot path commands (no response)
    // -------------------------------------------------------------------------
    /// Replace the pending per-tick delta
    SetDelta { dx: i32, dy: i32 },

    /// Overwrite the target position (clamped)
    SetPosition { x: i32, y: i32 },

    // -------------------------------------------------------------------------
    // Request-response commands
    // -------------------------------------------------------------------------
    /// Set the navigation block flag; acknowledged once applied
    SetBlocked {
        blocked: bool,
        response: oneshot::Sender<()>,
    },

    /// Copy of the current state
    Snapshot {
        response: oneshot::Sender<MotionSnapshot>,
    },

    /// Apply the pending delta once and hand back the move target, if any
    Advance {
        response: oneshot::Sender<Option<Point>>,
    },

    /// Stop the actor
    Shutdown,
}
