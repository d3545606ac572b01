//! # Calibration Module
//!
//! Applies device dead-zones to analog samples and quantizes them into
//! discrete command symbols.
//!
//! ## Deadzone
//!
//! The dead-zone is reported by the input device per axis. A sample whose
//! magnitude is within the dead-zone reads as 0.0; anything outside it passes
//! through unchanged (no rescaling).
//!
//! ## Quantization
//!
//! | Input | Rule | Output |
//! |-------|------|--------|
//! | Left stick Y | rounded to 2 dp: 0 / negative / positive | Neutral / Forward / Reverse |
//! | Right stick X | rounded to 2 dp: `abs < 0.1` / negative / positive | Centered / Left / Right |
//! | Trigger | `clamp(p, 0, 1) * 90`, truncated | 0-90 |
//! | Hat X/Y | beyond ±0.5 | Up / Down / Left / Right |
//!
//! ## Usage
//!
//! ```
//! use joystick_bridge::command::state::{Drive, Turn};
//! use joystick_bridge::controller::calibration::{encode_drive, encode_trigger, encode_turn, normalize_axis};
//!
//! assert_eq!(normalize_axis(0.03, 0.05), 0.0);
//! assert_eq!(encode_drive(normalize_axis(-0.6, 0.05)), Drive::Forward);
//! assert_eq!(encode_turn(0.05), Turn::Centered);
//! assert_eq!(encode_trigger(1.0), 90);
//! ```

use std::cmp::Ordering;

use crate::command::state::{DPad, Drive, Turn, THROTTLE_MAX};

/// Half-width of the band around center that still reads as a centered turn.
pub const DEFAULT_TURN_CENTER_BAND: f64 = 0.1;

/// Hat deflection needed to register a D-pad direction.
pub const DEFAULT_HAT_THRESHOLD: f32 = 0.5;

/// Zeroes a sample that lies within the dead-zone.
///
/// # Examples
///
/// ```
/// use joystick_bridge::controller::calibration::normalize_axis;
///
/// assert_eq!(normalize_axis(-0.04, 0.05), 0.0);
/// assert_eq!(normalize_axis(0.05, 0.05), 0.0);
/// assert_eq!(normalize_axis(0.3, 0.05), 0.3);
/// ```
#[must_use]
pub fn normalize_axis(raw: f32, deadzone: f32) -> f32 {
    if raw.abs() <= deadzone {
        0.0
    } else {
        raw
    }
}

/// Rounds to two decimal places, half away from zero.
#[must_use]
pub fn round2(value: f32) -> f64 {
    (f64::from(value) * 100.0).round() / 100.0
}

/// Encodes a normalized vertical stick value as a drive direction.
///
/// Up on the stick is negative and means forward.
#[must_use]
pub fn encode_drive(value: f32) -> Drive {
    match round2(value).partial_cmp(&0.0) {
        Some(Ordering::Less) => Drive::Forward,
        Some(Ordering::Greater) => Drive::Reverse,
        _ => Drive::Neutral,
    }
}

/// Encodes a normalized horizontal stick value using the default center band.
#[must_use]
pub fn encode_turn(value: f32) -> Turn {
    AxisEncoder::default().turn(value)
}

/// Encodes trigger pressure (0.0 to 1.0) as a throttle level (0 to 90).
#[must_use]
pub fn encode_trigger(pressure: f32) -> u8 {
    AxisEncoder::default().trigger(pressure)
}

/// Encodes hat axes as a D-pad direction using the default threshold.
#[must_use]
pub fn encode_dpad_hat(x: f32, y: f32) -> Option<DPad> {
    AxisEncoder::default().dpad_hat(x, y)
}

/// Thresholds used when quantizing analog values.
///
/// The defaults reproduce the vehicle UI's expected encoding; the values are
/// configurable through `[controller]` in the config file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisEncoder {
    /// Rounded turn values with magnitude below this read as centered.
    turn_center_band: f64,
    /// Throttle level of a fully pressed trigger.
    trigger_max: u8,
    /// Hat deflection needed to register a D-pad direction.
    hat_threshold: f32,
}

impl Default for AxisEncoder {
    fn default() -> Self {
        Self {
            turn_center_band: DEFAULT_TURN_CENTER_BAND,
            trigger_max: THROTTLE_MAX,
            hat_threshold: DEFAULT_HAT_THRESHOLD,
        }
    }
}

impl AxisEncoder {
    /// Creates an encoder with explicit thresholds.
    ///
    /// `trigger_max` is capped at [`THROTTLE_MAX`].
    #[must_use]
    pub fn new(turn_center_band: f64, trigger_max: u8, hat_threshold: f32) -> Self {
        Self {
            turn_center_band: turn_center_band.max(0.0),
            trigger_max: trigger_max.min(THROTTLE_MAX),
            hat_threshold: hat_threshold.clamp(0.0, 1.0),
        }
    }

    /// Encodes a normalized vertical stick value. Same rule as [`encode_drive`].
    #[must_use]
    pub fn drive(&self, value: f32) -> Drive {
        encode_drive(value)
    }

    /// Encodes a normalized horizontal stick value as a turn direction.
    ///
    /// # Examples
    ///
    /// ```
    /// use joystick_bridge::command::state::Turn;
    /// use joystick_bridge::controller::calibration::AxisEncoder;
    ///
    /// let encoder = AxisEncoder::default();
    /// assert_eq!(encoder.turn(-0.5), Turn::Left);
    /// assert_eq!(encoder.turn(0.5), Turn::Right);
    /// assert_eq!(encoder.turn(0.09), Turn::Centered);
    /// ```
    #[must_use]
    pub fn turn(&self, value: f32) -> Turn {
        let x = round2(value);
        if x.is_nan() || x == 0.0 || x.abs() < self.turn_center_band {
            Turn::Centered
        } else if x < 0.0 {
            Turn::Left
        } else {
            Turn::Right
        }
    }

    /// Encodes trigger pressure as a throttle level.
    ///
    /// Pressure is clamped to 0.0..=1.0 (NaN reads as 0.0), scaled to the
    /// trigger maximum and truncated.
    #[must_use]
    pub fn trigger(&self, pressure: f32) -> u8 {
        let pressure = if pressure.is_nan() {
            0.0
        } else {
            pressure.clamp(0.0, 1.0)
        };
        let level = (pressure * f32::from(self.trigger_max)) as u8;
        level.min(self.trigger_max)
    }

    /// Encodes hat axes (-1.0 up/left, 1.0 down/right) as a D-pad direction.
    ///
    /// Vertical deflection wins over horizontal.
    #[must_use]
    pub fn dpad_hat(&self, x: f32, y: f32) -> Option<DPad> {
        let t = self.hat_threshold;
        if y < -t {
            Some(DPad::Up)
        } else if y > t {
            Some(DPad::Down)
        } else if x < -t {
            Some(DPad::Left)
        } else if x > t {
            Some(DPad::Right)
        } else {
            None
        }
    }
}

/// Range and flat zone of a raw integer device axis.
///
/// Used to bring raw samples (e.g. 0-255 on a DualSense) into the normalized
/// ranges the encoder works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub minimum: i32,
    pub maximum: i32,
    /// Device-reported flat (dead) zone, in raw units.
    pub flat: i32,
}

impl AxisRange {
    /// Creates a range.
    #[must_use]
    pub fn new(minimum: i32, maximum: i32, flat: i32) -> Self {
        Self {
            minimum,
            maximum,
            flat,
        }
    }

    fn half_span(&self) -> f32 {
        (self.maximum as f32 - self.minimum as f32) / 2.0
    }

    /// Maps a raw stick sample to -1.0..=1.0, center at 0.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use joystick_bridge::controller::calibration::AxisRange;
    ///
    /// let range = AxisRange::new(0, 255, 0);
    /// assert!((range.normalize_stick(0) - (-1.0)).abs() < 0.01);
    /// assert!(range.normalize_stick(128).abs() < 0.01);
    /// assert!((range.normalize_stick(255) - 1.0).abs() < 0.01);
    /// ```
    #[must_use]
    pub fn normalize_stick(&self, raw: i32) -> f32 {
        let half = self.half_span();
        if half <= 0.0 {
            return 0.0;
        }
        let center = self.minimum as f32 + half;
        ((raw as f32 - center) / half).clamp(-1.0, 1.0)
    }

    /// Maps a raw trigger sample to 0.0..=1.0.
    #[must_use]
    pub fn normalize_trigger(&self, raw: i32) -> f32 {
        let span = self.maximum as f32 - self.minimum as f32;
        if span <= 0.0 {
            return 0.0;
        }
        ((raw as f32 - self.minimum as f32) / span).clamp(0.0, 1.0)
    }

    /// Dead-zone in normalized stick units, or `fallback` if the device
    /// reports no flat zone.
    #[must_use]
    pub fn deadzone_or(&self, fallback: f32) -> f32 {
        let half = self.half_span();
        if self.flat <= 0 || half <= 0.0 {
            return fallback;
        }
        (self.flat as f32 / half).clamp(0.0, 1.0)
    }
}
