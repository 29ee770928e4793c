//! Simulated actuator - logs every call and tracks pipette state
//!
//! Rejects sequences a real pipette could not perform (aspirating without a
//! tip, picking a second tip, exceeding capacity), which makes it useful for
//! exercising failure paths as well as for running without hardware.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{ActuatorDriver, ActuatorError};
use crate::protocol::Point;

#[derive(Debug, Clone)]
struct PipetteState {
    position: Point,
    has_tip: bool,
    /// Liquid currently held (µL)
    held: f64,
    homed: bool,
}

pub struct SimulatedActuator {
    name: String,
    home: Point,
    max_volume: f64,
    state: Mutex<PipetteState>,
    /// Reason the next call should fail with, if any
    fault: Mutex<Option<String>>,
    call_count: Mutex<u64>,
}

impl SimulatedActuator {
    pub fn new(home: Point, max_volume: f64) -> Self {
        Self {
            name: "simulated".to_string(),
            home,
            max_volume,
            state: Mutex::new(PipetteState {
                position: home,
                has_tip: false,
                held: 0.0,
                homed: false,
            }),
            fault: Mutex::new(None),
            call_count: Mutex::new(0),
        }
    }

    /// Make the next driver call fail with a hardware fault
    pub fn inject_fault(&self, reason: impl Into<String>) {
        *self.fault.lock() = Some(reason.into());
    }

    pub fn has_tip(&self) -> bool {
        self.state.lock().has_tip
    }

    pub fn held_volume(&self) -> f64 {
        self.state.lock().held
    }

    pub fn is_homed(&self) -> bool {
        self.state.lock().homed
    }

    pub fn call_count(&self) -> u64 {
        *self.call_count.lock()
    }

    /// Count the call and consume a pending fault
    fn begin(&self, operation: &str) -> Result<(), ActuatorError> {
        *self.call_count.lock() += 1;
        debug!(driver = %self.name, operation, "Actuator call");
        match self.fault.lock().take() {
            Some(reason) => Err(ActuatorError::Hardware(reason)),
            None => Ok(()),
        }
    }

    fn stamp() -> String {
        chrono::Local::now().format("%H:%M:%S%.3f").to_string()
    }
}

#[async_trait]
impl ActuatorDriver for SimulatedActuator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn home(&self) -> Result<(), ActuatorError> {
        self.begin("home")?;
        let mut state = self.state.lock();
        state.position = self.home;
        state.homed = true;
        info!("🏠 [{}] Homed at {}", Self::stamp(), self.home);
        Ok(())
    }

    async fn pick_up_tip(&self) -> Result<(), ActuatorError> {
        self.begin("pick_up_tip")?;
        let mut state = self.state.lock();
        if state.has_tip {
            return Err(ActuatorError::TipAttached);
        }
        state.has_tip = true;
        info!("🧷 [{}] Picked up tip at {}", Self::stamp(), state.position);
        Ok(())
    }

    async fn drop_tip(&self) -> Result<(), ActuatorError> {
        self.begin("drop_tip")?;
        let mut state = self.state.lock();
        if !state.has_tip {
            return Err(ActuatorError::NoTip);
        }
        state.has_tip = false;
        state.held = 0.0;
        info!("🗑️  [{}] Dropped tip at {}", Self::stamp(), state.position);
        Ok(())
    }

    async fn aspirate(&self, volume: f64, at: Point) -> Result<(), ActuatorError> {
        self.begin("aspirate")?;
        let mut state = self.state.lock();
        if !state.has_tip {
            return Err(ActuatorError::NoTip);
        }
        let available = self.max_volume - state.held;
        if volume > available {
            return Err(ActuatorError::OverCapacity {
                requested: volume,
                available,
            });
        }
        state.position = at;
        state.held += volume;
        info!("💧 [{}] Aspirated {} µL at {} (holding {} µL)", Self::stamp(), volume, at, state.held);
        Ok(())
    }

    async fn dispense(&self, volume: f64, at: Point) -> Result<(), ActuatorError> {
        self.begin("dispense")?;
        let mut state = self.state.lock();
        if !state.has_tip {
            return Err(ActuatorError::NoTip);
        }
        if volume > state.held {
            return Err(ActuatorError::InsufficientVolume {
                requested: volume,
                held: state.held,
            });
        }
        state.position = at;
        state.held -= volume;
        info!("💦 [{}] Dispensed {} µL at {} (holding {} µL)", Self::stamp(), volume, at, state.held);
        Ok(())
    }

    async fn move_to(&self, point: Point, speed: f64) -> Result<(), ActuatorError> {
        self.begin("move_to")?;
        self.state.lock().position = point;
        info!("🦾 [{}] Moved to {} at {} mm/s", Self::stamp(), point, speed);
        Ok(())
    }

    async fn position(&self) -> Point {
        self.state.lock().position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actuator() -> SimulatedActuator {
        SimulatedActuator::new(Point::new(0, 0, 100), 20.0)
    }

    #[tokio::test]
    async fn test_pipetting_cycle() {
        let a = actuator();
        a.home().await.unwrap();
        assert!(a.is_homed());

        a.move_to(Point::new(50, 60, 100), 80.0).await.unwrap();
        assert_eq!(a.position().await, Point::new(50, 60, 100));

        a.pick_up_tip().await.unwrap();
        a.aspirate(15.0, Point::new(50, 60, 100)).await.unwrap();
        assert_eq!(a.held_volume(), 15.0);
        a.dispense(10.0, Point::new(70, 60, 100)).await.unwrap();
        assert_eq!(a.held_volume(), 5.0);
        assert_eq!(a.position().await, Point::new(70, 60, 100));

        a.drop_tip().await.unwrap();
        assert!(!a.has_tip());
        assert_eq!(a.held_volume(), 0.0);
        assert_eq!(a.call_count(), 6);
    }

    #[tokio::test]
    async fn test_invalid_sequences_are_rejected() {
        let a = actuator();
        let here = Point::new(0, 0, 100);

        assert_eq!(a.aspirate(5.0, here).await, Err(ActuatorError::NoTip));
        assert_eq!(a.drop_tip().await, Err(ActuatorError::NoTip));

        a.pick_up_tip().await.unwrap();
        assert_eq!(a.pick_up_tip().await, Err(ActuatorError::TipAttached));
        assert!(matches!(
            a.aspirate(25.0, here).await,
            Err(ActuatorError::OverCapacity { .. })
        ));
        assert!(matches!(
            a.dispense(1.0, here).await,
            Err(ActuatorError::InsufficientVolume { .. })
        ));
    }

    #[tokio::test]
    async fn test_injected_fault_fails_once() {
        let a = actuator();
        a.inject_fault("stall detected");

        assert_eq!(
            a.move_to(Point::new(1, 1, 1), 80.0).await,
            Err(ActuatorError::Hardware("stall detected".to_string()))
        );
        assert_eq!(a.position().await, Point::new(0, 0, 100));
        assert!(a.move_to(Point::new(1, 1, 1), 80.0).await.is_ok());
    }
}
