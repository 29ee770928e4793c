//! Actuator driver contract
//!
//! The executor talks to the robot only through [`ActuatorDriver`]. Real
//! hardware lives behind a vendor library; [`SimulatedActuator`] logs and
//! tracks state so the whole pipeline runs without a robot attached.

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::Point;

pub mod simulated;

pub use simulated::SimulatedActuator;

/// Failures reported by a driver
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActuatorError {
    #[error("no tip attached")]
    NoTip,

    #[error("a tip is already attached")]
    TipAttached,

    #[error("volume {requested} µL exceeds remaining capacity {available} µL")]
    OverCapacity { requested: f64, available: f64 },

    #[error("cannot dispense {requested} µL, only {held} µL held")]
    InsufficientVolume { requested: f64, held: f64 },

    #[error("hardware fault: {0}")]
    Hardware(String),
}

/// Pipetting robot operations
///
/// Methods take `&self`; drivers keep mutable state behind interior mutability
/// so they can be shared as `Arc<dyn ActuatorDriver>`.
#[async_trait]
pub trait ActuatorDriver: Send + Sync {
    /// Driver name for logs
    fn name(&self) -> &str;

    async fn home(&self) -> Result<(), ActuatorError>;

    async fn pick_up_tip(&self) -> Result<(), ActuatorError>;

    async fn drop_tip(&self) -> Result<(), ActuatorError>;

    async fn aspirate(&self, volume: f64, at: Point) -> Result<(), ActuatorError>;

    async fn dispense(&self, volume: f64, at: Point) -> Result<(), ActuatorError>;

    async fn move_to(&self, point: Point, speed: f64) -> Result<(), ActuatorError>;

    /// Current pipette position
    async fn position(&self) -> Point;
}
