//! MotionHandle - public API for the MotionActor

use tokio::sync::{mpsc, oneshot};

use super::actor::MotionActor;
use super::commands::MotionCommand;
use super::types::{MotionSnapshot, MotionState};
use crate::protocol::Point;

/// Cloneable handle to the motion actor
///
/// Writers that do not need confirmation (`set_delta`, `set_position`) are
/// fire-and-forget. Everything else waits for the actor's answer; if the actor
/// is gone those calls return a neutral value instead of failing.
#[derive(Clone)]
pub struct MotionHandle {
    cmd_tx: mpsc::UnboundedSender<MotionCommand>,
}

impl MotionHandle {
    pub(super) fn new(cmd_tx: mpsc::UnboundedSender<MotionCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Spawn a MotionActor owning `state`
    pub fn spawn(state: MotionState) -> Self {
        MotionActor::spawn(state)
    }

    /// Replace the pending per-tick delta
    pub fn set_delta(&self, dx: i32, dy: i32) {
        let _ = self.cmd_tx.send(MotionCommand::SetDelta { dx, dy });
    }

    /// Overwrite the target position (clamped to the workspace)
    pub fn set_position(&self, x: i32, y: i32) {
        let _ = self.cmd_tx.send(MotionCommand::SetPosition { x, y });
    }

    /// Set the navigation block flag and wait until it is applied
    pub async fn set_blocked(&self, blocked: bool) {
        let (response, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(MotionCommand::SetBlocked { blocked, response })
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Current state, or `None` when the actor has stopped
    pub async fn snapshot(&self) -> Option<MotionSnapshot> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx.send(MotionCommand::Snapshot { response }).ok()?;
        rx.await.ok()
    }

    pub async fn is_blocked(&self) -> bool {
        self.snapshot().await.map(|s| s.blocked).unwrap_or(false)
    }

    /// Run one navigation step; returns the move target when the position changed
    pub async fn advance(&self) -> Option<Point> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx.send(MotionCommand::Advance { response }).ok()?;
        rx.await.ok().flatten()
    }

    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(MotionCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::WorkspaceBounds;
    use std::time::Duration;

    fn spawn_at(x: i32, y: i32) -> MotionHandle {
        let bounds = WorkspaceBounds {
            min_x: 0,
            max_x: 150,
            min_y: 0,
            max_y: 150,
        };
        MotionHandle::spawn(MotionState::new(bounds, x, y, 100))
    }

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<MotionHandle>();
    }

    #[tokio::test]
    async fn test_delta_then_advance() {
        let handle = spawn_at(100, 100);
        handle.set_delta(10, 0);

        // Commands are processed in order, so the delta is visible here
        assert_eq!(handle.advance().await, Some(Point::new(110, 100, 100)));
        let snap = handle.snapshot().await.unwrap();
        assert_eq!((snap.loc_x, snap.dx, snap.dy), (110, 0, 0));
        assert_eq!(handle.advance().await, None);
    }

    #[tokio::test]
    async fn test_many_deltas_coalesce_into_one_move() {
        let handle = spawn_at(50, 50);
        for i in 0..20 {
            handle.set_delta(if i % 2 == 0 { 10 } else { -10 }, 10);
        }

        // Only the last delta survives; one advance, one move
        assert_eq!(handle.advance().await, Some(Point::new(40, 60, 100)));
        assert_eq!(handle.advance().await, None);
    }

    #[tokio::test]
    async fn test_blocked_flag_round_trip() {
        let handle = spawn_at(10, 10);
        assert!(!handle.is_blocked().await);

        handle.set_blocked(true).await;
        assert!(handle.is_blocked().await);
        handle.set_delta(10, 0);
        assert_eq!(handle.advance().await, None);

        handle.set_blocked(false).await;
        assert_eq!(handle.advance().await, Some(Point::new(20, 10, 100)));
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_escape_bounds() {
        let handle = spawn_at(75, 75);
        let mut tasks = Vec::new();
        for worker in 0..8 {
            let h = handle.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    let sign = if (worker + i) % 3 == 0 { -1 } else { 1 };
                    h.set_delta(sign * 40, -sign * 40);
                    if let Some(p) = h.advance().await {
                        assert!((0..=150).contains(&p.x) && (0..=150).contains(&p.y));
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snap = handle.snapshot().await.unwrap();
        assert!((0..=150).contains(&snap.loc_x));
        assert!((0..=150).contains(&snap.loc_y));
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let handle = spawn_at(0, 0);
        assert!(handle.is_alive());
        handle.shutdown();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_alive());
        assert!(handle.snapshot().await.is_none());
        assert_eq!(handle.advance().await, None);
    }
}
