//! Typed payloads for the engine's update channels.
//!
//! Every payload is sparse:
//! - `SensorReading`: device → engine, raw readings (and optionally the mode)
//! - `ControlCommand`: dashboard → engine, mode toggle and manual actuator values
//! - `ThresholdUpdate`: dashboard → engine, policy thresholds
//!
//! A field that is absent or `null` is left untouched by the engine. Decoding
//! is all-or-nothing: a payload with one bad field is rejected as a whole.

use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Partial sensor reading pushed by the device.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SensorReading {
    #[serde(default, deserialize_with = "lenient::int")]
    pub light_level: Option<i64>,

    #[serde(default, deserialize_with = "lenient::boolean")]
    pub motion_detected: Option<bool>,

    #[serde(default)]
    pub temperature: Option<f64>,

    /// Some firmware revisions toggle the mode over the sensor channel.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub auto_mode: Option<bool>,
}

/// Partial control command pushed by a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ControlCommand {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub auto_mode: Option<bool>,

    #[serde(default, deserialize_with = "lenient::boolean")]
    pub led_on: Option<bool>,

    /// Requested angle, clamped by the engine.
    #[serde(default, deserialize_with = "lenient::int")]
    pub servo_angle: Option<i64>,
}

/// Partial threshold update pushed by a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ThresholdUpdate {
    #[serde(default)]
    pub temp_threshold: Option<f64>,

    #[serde(default, deserialize_with = "lenient::int")]
    pub light_threshold: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("request body is empty")]
    Empty,

    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a JSON request body into one of the channel payloads.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, MessageError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(MessageError::Empty);
    }

    // Go through Value so arrays can't be decoded positionally into the struct
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(MessageError::NotAnObject);
    }

    Ok(T::deserialize(value)?)
}

/// Deserializers accepting the loose encodings devices and dashboards send.
///
/// Integers also accept finite floats (truncated toward zero, saturating),
/// booleans also accept numbers (zero is false). Strings are never coerced.
mod lenient {
    use std::fmt;

    use serde::Deserializer;
    use serde::de;
    use serde::de::Unexpected;
    use serde::de::Visitor;

    struct IntVisitor;

    impl<'de> Visitor<'de> for IntVisitor {
        type Value = Option<i64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(i64::try_from(v).unwrap_or(i64::MAX)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if !v.is_finite() {
                return Err(E::invalid_value(Unexpected::Float(v), &self));
            }
            Ok(Some(v.trunc() as i64))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }
    }

    struct BoolVisitor;

    impl<'de> Visitor<'de> for BoolVisitor {
        type Value = Option<bool>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v != 0))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v != 0))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v != 0.0))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        d.deserialize_option(IntVisitor)
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        d.deserialize_option(BoolVisitor)
    }
}
