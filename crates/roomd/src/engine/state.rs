use serde::Serialize;

/// Highest angle the servo accepts. Lower bound is 0.
pub const SERVO_MAX_ANGLE: u8 = 180;

/// Raw readings reported by the sensor device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    /// Ambient light from the LDR (0-4095 on the reference device).
    pub light_level: i64,

    /// PIR motion sensor output.
    pub motion_detected: bool,

    /// Temperature in °C.
    pub temperature: f64,
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            light_level: 0,
            motion_detected: false,
            temperature: 20.0,
        }
    }
}

/// Actuator outputs. Derived by the policy in auto mode, set by the dashboard in manual mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Actuators {
    pub led_on: bool,

    /// Always within `0..=SERVO_MAX_ANGLE`.
    pub servo_angle: u8,
}

/// Thresholds consumed by the automatic-control policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thresholds {
    /// Servo engages when the temperature is strictly above this value.
    pub temp_threshold: f64,

    /// LED turns on when the light level is strictly below this value.
    pub light_threshold: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temp_threshold: 25.0,
            light_threshold: 2000,
        }
    }
}

/// Operating mode, a view over `RoomState::auto_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Mode {
    Auto,
    Manual,
}

impl From<bool> for Mode {
    fn from(auto_mode: bool) -> Self {
        if auto_mode { Mode::Auto } else { Mode::Manual }
    }
}

/// The canonical room state.
///
/// Serialises to a flat object with the eight field names devices and
/// dashboards already understand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomState {
    #[serde(flatten)]
    pub sensors: SensorState,

    #[serde(flatten)]
    pub actuators: Actuators,

    pub auto_mode: bool,

    #[serde(flatten)]
    pub thresholds: Thresholds,
}

impl Default for RoomState {
    fn default() -> Self {
        Self {
            sensors: SensorState::default(),
            actuators: Actuators::default(),
            auto_mode: true,
            thresholds: Thresholds::default(),
        }
    }
}

impl RoomState {
    pub fn mode(&self) -> Mode {
        Mode::from(self.auto_mode)
    }

    /// Project the fields the device-facing control channel cares about.
    pub fn control(&self) -> ControlSnapshot {
        ControlSnapshot {
            auto_mode: self.auto_mode,
            led_on: self.actuators.led_on,
            servo_angle: self.actuators.servo_angle,
        }
    }
}

/// `{auto_mode, led_on, servo_angle}` projection of [`RoomState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlSnapshot {
    pub auto_mode: bool,
    pub led_on: bool,
    pub servo_angle: u8,
}

/// Clamp an arbitrary requested angle into the servo's range.
pub fn clamp_servo_angle(angle: i64) -> u8 {
    // Bounded to 0..=180 so the cast cannot truncate.
    angle.clamp(0, i64::from(SERVO_MAX_ANGLE)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = RoomState::default();
        assert_eq!(state.sensors.light_level, 0);
        assert!(!state.sensors.motion_detected);
        assert_eq!(state.sensors.temperature, 20.0);
        assert!(!state.actuators.led_on);
        assert_eq!(state.actuators.servo_angle, 0);
        assert!(state.auto_mode);
        assert_eq!(state.thresholds.temp_threshold, 25.0);
        assert_eq!(state.thresholds.light_threshold, 2000);
    }

    #[test]
    fn test_serializes_flat() {
        let json = serde_json::to_value(RoomState::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 8);
        for key in [
            "light_level",
            "motion_detected",
            "temperature",
            "led_on",
            "servo_angle",
            "auto_mode",
            "temp_threshold",
            "light_threshold",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_clamp_servo_angle() {
        assert_eq!(clamp_servo_angle(500), 180);
        assert_eq!(clamp_servo_angle(-20), 0);
        assert_eq!(clamp_servo_angle(90), 90);
        assert_eq!(clamp_servo_angle(180), 180);
        assert_eq!(clamp_servo_angle(i64::MIN), 0);
        assert_eq!(clamp_servo_angle(i64::MAX), 180);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Auto.to_string(), "AUTO");
        assert_eq!(Mode::Manual.to_string(), "MANUAL");
        assert_eq!(RoomState::default().mode(), Mode::Auto);
    }
}
