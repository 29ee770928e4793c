//! Motion state - authoritative navigation target of the input node
//!
//! The state is owned by a single actor task; every read, write, and tick
//! goes through [`MotionHandle`], so no field is ever read-modified-written
//! concurrently.

mod actor;
mod actor_handle;
mod commands;
mod types;

pub use actor_handle::MotionHandle;
pub use types::{MotionSnapshot, MotionState, WorkspaceBounds};
