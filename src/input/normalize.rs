//! Input normalization (dead zone, inversion, unit step)
//!
//! Turns a directional sample into a per-axis step in `{-step, 0, +step}`.
//! Axes are thresholded independently, so noise inside the dead zone on one
//! axis never leaks into the other.

use crate::config::MotionConfig;

/// Source of a directional sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisSample {
    /// Analog stick, each axis in [-1.0, 1.0]
    Stick { x: f32, y: f32 },
    /// Digital hat / D-pad, each axis in {-1, 0, 1}
    Hat { x: i8, y: i8 },
}

/// Dead zone, inversion, and step size applied to samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    pub deadzone: f32,
    pub hat_deadzone: f32,
    pub step: i32,
    pub invert_x: bool,
    pub invert_y: bool,
}

/// Map one axis value to a unit step
///
/// Values strictly beyond `threshold` map to `±step`; everything inside the
/// closed interval `[-threshold, threshold]` maps to 0.
pub fn axis_to_step(value: f32, threshold: f32, step: i32) -> i32 {
    if value > threshold {
        step
    } else if value < -threshold {
        -step
    } else {
        0
    }
}

impl Normalizer {
    pub fn from_config(config: &MotionConfig) -> Self {
        Self {
            deadzone: config.deadzone,
            hat_deadzone: config.hat_deadzone,
            step: config.step,
            invert_x: config.is_inverted("x"),
            invert_y: config.is_inverted("y"),
        }
    }

    /// Normalize a sample into `(dx, dy)`
    pub fn normalize(&self, sample: AxisSample) -> (i32, i32) {
        let (x, y, threshold) = match sample {
            AxisSample::Stick { x, y } => (x, y, self.deadzone),
            AxisSample::Hat { x, y } => (f32::from(x), f32::from(y), self.hat_deadzone),
        };

        let x = if self.invert_x { -x } else { x };
        let y = if self.invert_y { -y } else { y };

        (
            axis_to_step(x, threshold, self.step),
            axis_to_step(y, threshold, self.step),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn normalizer() -> Normalizer {
        Normalizer {
            deadzone: 0.5,
            hat_deadzone: 0.0,
            step: 10,
            invert_x: false,
            invert_y: false,
        }
    }

    #[test]
    fn test_axis_thresholds() {
        assert_eq!(axis_to_step(0.9, 0.5, 10), 10);
        assert_eq!(axis_to_step(-0.9, 0.5, 10), -10);
        assert_eq!(axis_to_step(0.5, 0.5, 10), 0); // Boundary is inside the dead zone
        assert_eq!(axis_to_step(-0.5, 0.5, 10), 0);
        assert_eq!(axis_to_step(0.0, 0.5, 10), 0);
    }

    #[test]
    fn test_sample_inside_dead_zone_is_still() {
        // Raw units: value 5 against threshold 10
        assert_eq!(axis_to_step(5.0, 10.0, 10), 0);
        assert_eq!(normalizer().normalize(AxisSample::Stick { x: 0.3, y: -0.2 }), (0, 0));
    }

    #[test]
    fn test_axes_are_independent() {
        let n = normalizer();
        assert_eq!(n.normalize(AxisSample::Stick { x: 0.8, y: 0.1 }), (10, 0));
        assert_eq!(n.normalize(AxisSample::Stick { x: -0.1, y: -0.8 }), (0, -10));
        assert_eq!(n.normalize(AxisSample::Stick { x: -1.0, y: 1.0 }), (-10, 10));
    }

    #[test]
    fn test_hat_any_nonzero_is_directional() {
        let n = normalizer();
        assert_eq!(n.normalize(AxisSample::Hat { x: 1, y: 0 }), (10, 0));
        assert_eq!(n.normalize(AxisSample::Hat { x: -1, y: 1 }), (-10, 10));
        assert_eq!(n.normalize(AxisSample::Hat { x: 0, y: 0 }), (0, 0));
    }

    #[test]
    fn test_inversion() {
        let mut n = normalizer();
        n.invert_y = true;
        assert_eq!(n.normalize(AxisSample::Stick { x: 0.9, y: 0.9 }), (10, -10));
        assert_eq!(n.normalize(AxisSample::Hat { x: 0, y: -1 }), (0, 10));
    }

    #[test]
    fn test_from_config() {
        let mut config = MotionConfig::default();
        config.step = 25;
        config.invert.insert("x".to_string(), true);

        let n = Normalizer::from_config(&config);
        assert_eq!(n.step, 25);
        assert!(n.invert_x);
        assert!(!n.invert_y);
    }

    proptest! {
        #[test]
        fn prop_dead_zone_always_zero(threshold in 0.0f32..1.0, frac in -1.0f32..=1.0) {
            let value = threshold * frac;
            prop_assert_eq!(axis_to_step(value, threshold, 10), 0);
        }

        #[test]
        fn prop_output_is_unit_step(x in -1.0f32..=1.0, y in -1.0f32..=1.0) {
            let (dx, dy) = normalizer().normalize(AxisSample::Stick { x, y });
            prop_assert!([-10, 0, 10].contains(&dx));
            prop_assert!([-10, 0, 10].contains(&dy));
        }
    }
}
