//! Automatic-control policy.
//!
//! A pure function of the latest sensor readings and the configured
//! thresholds. The engine only calls it while auto mode is active.

use super::state::Actuators;
use super::state::SensorState;
use super::state::Thresholds;

/// Servo angle when motion and heat are both present.
pub const SERVO_ENGAGED_ANGLE: u8 = 90;

/// Servo angle otherwise.
pub const SERVO_RESTING_ANGLE: u8 = 0;

/// Derive actuator outputs from sensor readings.
///
/// - LED on when `light_level < light_threshold`.
/// - Servo engaged when motion is detected AND `temperature > temp_threshold`.
///
/// Both comparisons are strict: a reading equal to its threshold does not trigger.
pub fn evaluate(sensors: &SensorState, thresholds: &Thresholds) -> Actuators {
    let led_on = sensors.light_level < thresholds.light_threshold;

    let servo_angle = if sensors.motion_detected && sensors.temperature > thresholds.temp_threshold {
        SERVO_ENGAGED_ANGLE
    } else {
        SERVO_RESTING_ANGLE
    };

    Actuators {
        led_on,
        servo_angle,
    }
}
