use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::debug;
use tracing::info;

use super::message::ControlCommand;
use super::message::SensorReading;
use super::message::ThresholdUpdate;
use super::policy;
use super::state::ControlSnapshot;
use super::state::Mode;
use super::state::RoomState;
use super::state::clamp_servo_angle;

/// roomd engine
///
/// Owns the single room state and arbitrates between the sensor device, the
/// dashboards and the automatic-control policy.
///
/// Every operation runs under one mutex acquisition, so a read-modify-write
/// (merge then recompute, mode switch then manual write) is never observed
/// half-done. The lock is only held for field assignments and one policy
/// evaluation; logging happens after it is released.
pub struct Engine {
    state: Mutex<RoomState>,
}

impl Engine {
    /// Create an engine whose state starts at `initial`.
    pub fn new(initial: RoomState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    // State is plain data and every critical section leaves it valid, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a sensor reading and, in auto mode, re-derive the actuators.
    ///
    /// Returns the control fields as they stand after the update so the device
    /// can drive its actuators without a second round trip.
    pub fn apply_sensor_update(&self, reading: SensorReading) -> ControlSnapshot {
        let (transition, control, state) = {
            let mut state = self.lock();

            let transition = reading
                .auto_mode
                .and_then(|auto_mode| set_auto_mode(&mut state, auto_mode));

            if let Some(light_level) = reading.light_level {
                state.sensors.light_level = light_level;
            }
            if let Some(motion_detected) = reading.motion_detected {
                state.sensors.motion_detected = motion_detected;
            }
            if let Some(temperature) = reading.temperature {
                state.sensors.temperature = temperature;
            }

            if state.auto_mode {
                state.actuators = policy::evaluate(&state.sensors, &state.thresholds);
            }

            (transition, state.control(), state.sensors.clone())
        };

        log_transition(transition, "sensor");
        debug!(
            "Sensor update: light_level={}, motion_detected={}, temperature={} -> led_on={}, servo_angle={} ({})",
            state.light_level,
            state.motion_detected,
            state.temperature,
            control.led_on,
            control.servo_angle,
            Mode::from(control.auto_mode)
        );

        control
    }

    /// Apply a dashboard control command.
    ///
    /// The mode is switched first; manual actuator values in the same command
    /// are then applied only if the engine is in manual mode. No policy
    /// recomputation happens here.
    pub fn apply_control_update(&self, command: ControlCommand) {
        let (transition, ignored, control) = {
            let mut state = self.lock();

            let transition = command
                .auto_mode
                .and_then(|auto_mode| set_auto_mode(&mut state, auto_mode));

            let has_manual = command.led_on.is_some() || command.servo_angle.is_some();
            let ignored = state.auto_mode && has_manual;

            if !state.auto_mode {
                if let Some(led_on) = command.led_on {
                    state.actuators.led_on = led_on;
                }
                if let Some(angle) = command.servo_angle {
                    state.actuators.servo_angle = clamp_servo_angle(angle);
                }
            }

            (transition, ignored, state.control())
        };

        log_transition(transition, "control");
        if ignored {
            debug!(
                "Ignoring manual actuator values while in AUTO mode: led_on={:?}, servo_angle={:?}",
                command.led_on, command.servo_angle
            );
        }
        debug!(
            "Control update: led_on={}, servo_angle={} ({})",
            control.led_on,
            control.servo_angle,
            Mode::from(control.auto_mode)
        );
    }

    /// Overwrite the present thresholds.
    ///
    /// Actuators are not re-derived until the next sensor update.
    pub fn apply_threshold_update(&self, update: ThresholdUpdate) {
        let thresholds = {
            let mut state = self.lock();
            if let Some(temp_threshold) = update.temp_threshold {
                state.thresholds.temp_threshold = temp_threshold;
            }
            if let Some(light_threshold) = update.light_threshold {
                state.thresholds.light_threshold = light_threshold;
            }
            state.thresholds.clone()
        };

        debug!(
            "Threshold update: temp_threshold={}, light_threshold={}",
            thresholds.temp_threshold, thresholds.light_threshold
        );
    }

    /// Get a consistent copy of the whole room state.
    pub fn state_snapshot(&self) -> RoomState {
        self.lock().clone()
    }

    /// Get the `{auto_mode, led_on, servo_angle}` projection.
    pub fn control_snapshot(&self) -> ControlSnapshot {
        self.lock().control()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(RoomState::default())
    }
}

/// Write `auto_mode`, returning the transition if the mode actually changed.
fn set_auto_mode(state: &mut RoomState, auto_mode: bool) -> Option<(Mode, Mode)> {
    let from = state.mode();
    state.auto_mode = auto_mode;
    let to = state.mode();
    (from != to).then_some((from, to))
}

fn log_transition(transition: Option<(Mode, Mode)>, channel: &str) {
    if let Some((from, to)) = transition {
        info!("Mode changed via {} channel: {} -> {}", channel, from, to);
    }
}
