//! Per-operation handlers
//!
//! Handlers never propagate driver errors: a failure is folded into the
//! [`HandlerOutcome`] so the executor still answers on the feedback channel.

use tracing::{error, info, warn};

use super::ExecutorSettings;
use crate::actuator::{ActuatorDriver, ActuatorError};
use crate::protocol::{Feedback, Operation, Point, Request};

/// Result of running one handler
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub operation: Operation,
    pub feedback: Feedback,
    pub error: Option<ActuatorError>,
}

impl HandlerOutcome {
    fn from_result(operation: Operation, result: Result<Feedback, ActuatorError>) -> Self {
        match result {
            Ok(feedback) => Self {
                operation,
                feedback,
                error: None,
            },
            Err(e) => {
                error!("❌ {} failed: {}", operation, e);
                Self {
                    operation,
                    feedback: None,
                    error: Some(e),
                }
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Dispatch a decoded request to its handler
pub async fn handle(driver: &dyn ActuatorDriver, settings: &ExecutorSettings, request: Request) -> HandlerOutcome {
    let operation = request.operation();
    let result = match request {
        Request::Move(point) => on_move(driver, settings, point).await,
        Request::Pick => on_pick(driver).await,
        Request::Aspirate { volume } => on_aspirate(driver, volume.unwrap_or(settings.default_volume)).await,
        Request::Dispense { volume } => on_dispense(driver, volume.unwrap_or(settings.default_volume)).await,
        Request::Eject => on_eject(driver, settings).await,
    };
    HandlerOutcome::from_result(operation, result)
}

async fn on_move(driver: &dyn ActuatorDriver, settings: &ExecutorSettings, point: Point) -> Result<Feedback, ActuatorError> {
    driver.move_to(point, settings.speed).await?;
    Ok(None)
}

async fn on_pick(driver: &dyn ActuatorDriver) -> Result<Feedback, ActuatorError> {
    driver.pick_up_tip().await?;
    info!("Tip attached");
    Ok(None)
}

async fn on_aspirate(driver: &dyn ActuatorDriver, volume: f64) -> Result<Feedback, ActuatorError> {
    let at = driver.position().await;
    driver.aspirate(volume, at).await?;
    Ok(None)
}

async fn on_dispense(driver: &dyn ActuatorDriver, volume: f64) -> Result<Feedback, ActuatorError> {
    let at = driver.position().await;
    driver.dispense(volume, at).await?;
    Ok(None)
}

/// Travel to the trash location and drop the tip; reports where it ended up
///
/// Ejecting with no tip attached still reports the trash location.
async fn on_eject(driver: &dyn ActuatorDriver, settings: &ExecutorSettings) -> Result<Feedback, ActuatorError> {
    driver.move_to(settings.trash, settings.speed).await?;
    match driver.drop_tip().await {
        Ok(()) => info!("Tip ejected at {}", settings.trash),
        Err(ActuatorError::NoTip) => warn!("Eject with no tip attached, nothing to drop"),
        Err(e) => return Err(e),
    }
    Ok(Some(settings.trash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::SimulatedActuator;

    fn settings() -> ExecutorSettings {
        ExecutorSettings {
            speed: 80.0,
            default_volume: 10.0,
            trash: Point::new(320, 360, 100),
        }
    }

    #[tokio::test]
    async fn test_default_volume_applies_when_absent() {
        let driver = SimulatedActuator::new(Point::new(0, 0, 100), 20.0);
        handle(&driver, &settings(), Request::Pick).await;

        let outcome = handle(&driver, &settings(), Request::Aspirate { volume: None }).await;
        assert!(outcome.is_ok());
        assert_eq!(driver.held_volume(), 10.0);

        let outcome = handle(&driver, &settings(), Request::Dispense { volume: Some(4.0) }).await;
        assert!(outcome.is_ok());
        assert_eq!(driver.held_volume(), 6.0);
    }

    #[tokio::test]
    async fn test_eject_reports_trash_location() {
        let driver = SimulatedActuator::new(Point::new(0, 0, 100), 20.0);
        handle(&driver, &settings(), Request::Pick).await;

        let outcome = handle(&driver, &settings(), Request::Eject).await;
        assert_eq!(outcome.operation, Operation::Eject);
        assert_eq!(outcome.feedback, Some(Point::new(320, 360, 100)));
        assert!(!driver.has_tip());
        assert_eq!(driver.position().await, Point::new(320, 360, 100));
    }

    #[tokio::test]
    async fn test_eject_without_tip_still_reports_trash_location() {
        let driver = SimulatedActuator::new(Point::new(0, 0, 100), 20.0);

        let outcome = handle(&driver, &settings(), Request::Eject).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.feedback, Some(Point::new(320, 360, 100)));
        assert_eq!(driver.position().await, Point::new(320, 360, 100));
    }

    #[tokio::test]
    async fn test_driver_error_folds_into_outcome() {
        let driver = SimulatedActuator::new(Point::new(0, 0, 100), 20.0);

        let outcome = handle(&driver, &settings(), Request::Aspirate { volume: None }).await;
        assert_eq!(outcome.feedback, None);
        assert_eq!(outcome.error, Some(ActuatorError::NoTip));

        // A failed move to the trash means no position is reported
        driver.inject_fault("gantry stalled");
        let outcome = handle(&driver, &settings(), Request::Eject).await;
        assert_eq!(outcome.feedback, None);
        assert_eq!(outcome.error, Some(ActuatorError::Hardware("gantry stalled".to_string())));
    }
}
