//! Motion state record and its step rule

use crate::config::{AppConfig, WorkspaceConfig};
use crate::protocol::Point;

/// Inclusive workspace bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl WorkspaceBounds {
    pub fn clamp_x(&self, x: i32) -> i32 {
        x.clamp(self.min_x, self.max_x)
    }

    pub fn clamp_y(&self, y: i32) -> i32 {
        y.clamp(self.min_y, self.max_y)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}

impl From<&WorkspaceConfig> for WorkspaceBounds {
    fn from(ws: &WorkspaceConfig) -> Self {
        Self {
            min_x: ws.min_x,
            max_x: ws.max_x,
            min_y: ws.min_y,
            max_y: ws.max_y,
        }
    }
}

/// Point-in-time copy of the motion state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionSnapshot {
    pub loc_x: i32,
    pub loc_y: i32,
    pub dx: i32,
    pub dy: i32,
    pub blocked: bool,
}

/// Target position, pending per-tick delta, and the navigation block flag
///
/// Invariant: `loc_x`/`loc_y` always lie inside `bounds`; every write clamps.
#[derive(Debug, Clone)]
pub struct MotionState {
    loc_x: i32,
    loc_y: i32,
    dx: i32,
    dy: i32,
    blocked: bool,
    bounds: WorkspaceBounds,
    travel_height: i32,
}

impl MotionState {
    pub fn new(bounds: WorkspaceBounds, start_x: i32, start_y: i32, travel_height: i32) -> Self {
        Self {
            loc_x: bounds.clamp_x(start_x),
            loc_y: bounds.clamp_y(start_y),
            dx: 0,
            dy: 0,
            blocked: false,
            bounds,
            travel_height,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            WorkspaceBounds::from(&config.workspace),
            config.motion.start_x,
            config.motion.start_y,
            config.motion.travel_height,
        )
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            loc_x: self.loc_x,
            loc_y: self.loc_y,
            dx: self.dx,
            dy: self.dy,
            blocked: self.blocked,
        }
    }

    pub fn set_delta(&mut self, dx: i32, dy: i32) {
        self.dx = dx;
        self.dy = dy;
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Overwrite the target position (clamped)
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.loc_x = self.bounds.clamp_x(x);
        self.loc_y = self.bounds.clamp_y(y);
    }

    /// Apply the pending delta once
    ///
    /// Blocked or idle ticks leave the state untouched. Otherwise the delta
    /// is applied with clamping and consumed; the move target is returned
    /// only when the position actually changed.
    pub fn advance(&mut self) -> Option<Point> {
        if self.blocked || (self.dx == 0 && self.dy == 0) {
            return None;
        }

        let next_x = self.bounds.clamp_x(self.loc_x.saturating_add(self.dx));
        let next_y = self.bounds.clamp_y(self.loc_y.saturating_add(self.dy));
        let moved = next_x != self.loc_x || next_y != self.loc_y;

        self.loc_x = next_x;
        self.loc_y = next_y;
        self.dx = 0;
        self.dy = 0;

        moved.then(|| Point::new(self.loc_x, self.loc_y, self.travel_height))
    }
}
