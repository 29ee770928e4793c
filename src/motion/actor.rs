//! MotionActor - single owner of the motion state
//!
//! All commands are processed sequentially from one channel, which gives the
//! navigation loop, the input pump and the action dispatcher atomic access
//! to the whole record without a lock.

use super::actor_handle::MotionHandle;
use super::commands::MotionCommand;
use super::types::MotionState;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

pub struct MotionActor {
    state: MotionState,
    command_rx: mpsc::UnboundedReceiver<MotionCommand>,
    /// Number of ticks that produced a move
    move_count: u64,
}

impl MotionActor {
    /// Spawn the actor on the current runtime and return its handle
    pub fn spawn(state: MotionState) -> MotionHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();

        let snap = state.snapshot();
        let actor = MotionActor {
            state,
            command_rx,
            move_count: 0,
        };
        tokio::spawn(actor.run());

        info!(x = snap.loc_x, y = snap.loc_y, "MotionActor spawned");
        MotionHandle::new(cmd_tx)
    }

    async fn run(mut self) {
        debug!("MotionActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing motion command");

            match cmd {
                MotionCommand::SetDelta { dx, dy } => {
                    self.state.set_delta(dx, dy);
                }
                MotionCommand::SetPosition { x, y } => {
                    self.state.set_position(x, y);
                    debug!(x, y, "Target position overwritten");
                }
                MotionCommand::SetBlocked { blocked, response } => {
                    self.state.set_blocked(blocked);
                    let _ = response.send(());
                }
                MotionCommand::Snapshot { response } => {
                    let _ = response.send(self.state.snapshot());
                }
                MotionCommand::Advance { response } => {
                    let target = self.state.advance();
                    if target.is_some() {
                        self.move_count += 1;
                    }
                    let _ = response.send(target);
                }
                MotionCommand::Shutdown => {
                    info!("MotionActor received shutdown command");
                    break;
                }
            }
        }

        info!(move_count = self.move_count, "MotionActor run loop terminated");
    }
}
