//! # evdev Input Source
//!
//! Translates Linux evdev events from a gamepad into [`ControlEvent`]s.
//!
//! ## Axis Layouts
//!
//! | Role | Standard (`hid-playstation`, `xpad`) | Generic (`hid-generic`) |
//! |------|--------------------------------------|-------------------------|
//! | Drive (left stick Y) | ABS_Y | ABS_Y |
//! | Turn (right stick X) | ABS_RX | ABS_Z |
//! | Left trigger | ABS_Z | ABS_BRAKE |
//! | Right trigger | ABS_RZ | ABS_GAS |
//! | D-pad | ABS_HAT0X / ABS_HAT0Y | ABS_HAT0X / ABS_HAT0Y |
//!
//! Standard follows the Linux gamepad convention (right stick on
//! ABS_RX/ABS_RY, analog triggers on ABS_Z/ABS_RZ), which both the DualSense
//! and Xbox drivers report. Generic covers plain HID pads whose right stick
//! X is the HID Z usage.
//!
//! ## Buttons
//!
//! Face buttons follow the Linux gamepad convention by position: BTN_SOUTH is
//! `A`, BTN_EAST is `B`, BTN_WEST is `X`, BTN_NORTH is `Y`. Pads that report
//! the D-pad as keys use BTN_DPAD_*.
//!
//! Raw samples are scaled with the range the device reports for each axis,
//! and the device's `flat` value becomes the dead-zone.

use std::collections::HashMap;

use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, Key as EvKey};
use serde::Deserialize;
use tracing::debug;

use super::calibration::AxisRange;
use super::mapper::{Axis, AxisSample, ControlEvent, Key};

/// Range assumed for stick and trigger axes the device does not describe.
const DEFAULT_ANALOG_RANGE: AxisRange = AxisRange {
    minimum: 0,
    maximum: 255,
    flat: 0,
};

/// Range assumed for hat axes the device does not describe.
const DEFAULT_HAT_RANGE: AxisRange = AxisRange {
    minimum: -1,
    maximum: 1,
    flat: 0,
};

/// Which evdev axes carry which controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisLayout {
    #[default]
    #[serde(alias = "dualsense", alias = "xbox")]
    Standard,
    Generic,
}

impl AxisLayout {
    /// Maps an evdev absolute axis to a control role.
    #[must_use]
    pub fn role(self, axis: AbsoluteAxisType) -> Option<Axis> {
        match (self, axis) {
            (_, AbsoluteAxisType::ABS_Y) => Some(Axis::Vertical),
            (_, AbsoluteAxisType::ABS_HAT0X) => Some(Axis::HatX),
            (_, AbsoluteAxisType::ABS_HAT0Y) => Some(Axis::HatY),

            (AxisLayout::Standard, AbsoluteAxisType::ABS_RX) => Some(Axis::Horizontal),
            (AxisLayout::Standard, AbsoluteAxisType::ABS_Z) => Some(Axis::LeftTrigger),
            (AxisLayout::Standard, AbsoluteAxisType::ABS_RZ) => Some(Axis::RightTrigger),

            (AxisLayout::Generic, AbsoluteAxisType::ABS_Z) => Some(Axis::Horizontal),
            (AxisLayout::Generic, AbsoluteAxisType::ABS_BRAKE) => Some(Axis::LeftTrigger),
            (AxisLayout::Generic, AbsoluteAxisType::ABS_GAS) => Some(Axis::RightTrigger),

            _ => None,
        }
    }
}

/// Maps an evdev key to a control key.
#[must_use]
pub fn map_key(key: EvKey) -> Key {
    match key {
        EvKey::BTN_SOUTH => Key::A,
        EvKey::BTN_EAST => Key::B,
        EvKey::BTN_WEST => Key::X,
        EvKey::BTN_NORTH => Key::Y,
        EvKey::BTN_DPAD_UP => Key::DpadUp,
        EvKey::BTN_DPAD_DOWN => Key::DpadDown,
        EvKey::BTN_DPAD_LEFT => Key::DpadLeft,
        EvKey::BTN_DPAD_RIGHT => Key::DpadRight,
        other => Key::Other(other.code()),
    }
}

/// Per-device translator from evdev events to [`ControlEvent`]s.
#[derive(Debug, Clone)]
pub struct EvdevTranslator {
    layout: AxisLayout,
    ranges: HashMap<u16, AxisRange>,
    fallback_deadzone: f32,
}

impl EvdevTranslator {
    /// Creates a translator with explicit axis ranges, keyed by evdev axis code.
    #[must_use]
    pub fn new(layout: AxisLayout, ranges: HashMap<u16, AxisRange>, fallback_deadzone: f32) -> Self {
        Self {
            layout,
            ranges,
            fallback_deadzone,
        }
    }

    /// Creates a translator from the axis ranges an opened device reports.
    ///
    /// Axes whose info cannot be read fall back to defaults.
    #[must_use]
    pub fn from_device(device: &Device, layout: AxisLayout, fallback_deadzone: f32) -> Self {
        let mut ranges = HashMap::new();

        if let (Some(axes), Ok(abs_state)) = (device.supported_absolute_axes(), device.get_abs_state()) {
            for axis in axes.iter() {
                if let Some(info) = abs_state.get(axis.0 as usize) {
                    let range = AxisRange::new(info.minimum, info.maximum, info.flat);
                    debug!("Axis {:?}: {:?}", axis, range);
                    ranges.insert(axis.0, range);
                }
            }
        }

        Self::new(layout, ranges, fallback_deadzone)
    }

    /// Translates one evdev event. Sync and unmapped events yield `None`.
    #[must_use]
    pub fn translate(&self, event: &InputEvent) -> Option<ControlEvent> {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => {
                let role = self.layout.role(axis)?;
                Some(ControlEvent::Axis {
                    axis: role,
                    sample: self.sample(role, axis.0, event.value()),
                })
            }
            InputEventKind::Key(key) => Some(ControlEvent::Key {
                key: map_key(key),
                pressed: event.value() != 0,
            }),
            _ => None,
        }
    }

    fn sample(&self, role: Axis, code: u16, raw: i32) -> AxisSample {
        match role {
            Axis::Vertical | Axis::Horizontal => {
                let range = self.range(code, DEFAULT_ANALOG_RANGE);
                AxisSample::new(range.normalize_stick(raw), range.deadzone_or(self.fallback_deadzone))
            }
            Axis::LeftTrigger | Axis::RightTrigger => {
                let range = self.range(code, DEFAULT_ANALOG_RANGE);
                AxisSample::new(range.normalize_trigger(raw), 0.0)
            }
            Axis::HatX | Axis::HatY => {
                let range = self.range(code, DEFAULT_HAT_RANGE);
                AxisSample::new(range.normalize_stick(raw), 0.0)
            }
        }
    }

    fn range(&self, code: u16, default: AxisRange) -> AxisRange {
        self.ranges.get(&code).copied().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    /// Helper to create an axis event for testing.
    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    /// Helper to create a key event for testing.
    fn make_key_event(key: EvKey, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), value)
    }

    fn translator(layout: AxisLayout) -> EvdevTranslator {
        EvdevTranslator::new(layout, HashMap::new(), 0.05)
    }

    #[test]
    fn test_standard_layout_roles() {
        let layout = AxisLayout::Standard;
        assert_eq!(layout.role(AbsoluteAxisType::ABS_Y), Some(Axis::Vertical));
        assert_eq!(layout.role(AbsoluteAxisType::ABS_RX), Some(Axis::Horizontal));
        assert_eq!(layout.role(AbsoluteAxisType::ABS_Z), Some(Axis::LeftTrigger));
        assert_eq!(layout.role(AbsoluteAxisType::ABS_RZ), Some(Axis::RightTrigger));
        assert_eq!(layout.role(AbsoluteAxisType::ABS_HAT0Y), Some(Axis::HatY));
        assert_eq!(layout.role(AbsoluteAxisType::ABS_X), None);
        assert_eq!(layout.role(AbsoluteAxisType::ABS_RY), None);
    }

    #[test]
    fn test_generic_layout_roles() {
        let layout = AxisLayout::Generic;
        assert_eq!(layout.role(AbsoluteAxisType::ABS_Z), Some(Axis::Horizontal));
        assert_eq!(layout.role(AbsoluteAxisType::ABS_BRAKE), Some(Axis::LeftTrigger));
        assert_eq!(layout.role(AbsoluteAxisType::ABS_GAS), Some(Axis::RightTrigger));
        assert_eq!(layout.role(AbsoluteAxisType::ABS_RX), None);
    }

    #[test]
    fn test_released_l2_does_not_steer() {
        // DualSense L2 at rest reports 0 on ABS_Z
        let t = translator(AxisLayout::Standard);

        match t.translate(&make_axis_event(AbsoluteAxisType::ABS_Z, 0)) {
            Some(ControlEvent::Axis { axis, sample }) => {
                assert_eq!(axis, Axis::LeftTrigger);
                assert_eq!(sample.value, 0.0);
            }
            other => panic!("Expected axis event, got {:?}", other),
        }

        match t.translate(&make_axis_event(AbsoluteAxisType::ABS_RX, 128)) {
            Some(ControlEvent::Axis { axis, sample }) => {
                assert_eq!(axis, Axis::Horizontal);
                assert!(sample.value.abs() < 0.01);
            }
            other => panic!("Expected axis event, got {:?}", other),
        }
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(map_key(EvKey::BTN_SOUTH), Key::A);
        assert_eq!(map_key(EvKey::BTN_EAST), Key::B);
        assert_eq!(map_key(EvKey::BTN_WEST), Key::X);
        assert_eq!(map_key(EvKey::BTN_NORTH), Key::Y);
        assert_eq!(map_key(EvKey::BTN_DPAD_LEFT), Key::DpadLeft);
        assert_eq!(map_key(EvKey::BTN_TL), Key::Other(EvKey::BTN_TL.code()));
    }

    #[test]
    fn test_translate_stick_with_default_range() {
        let t = translator(AxisLayout::Standard);

        match t.translate(&make_axis_event(AbsoluteAxisType::ABS_Y, 0)) {
            Some(ControlEvent::Axis { axis, sample }) => {
                assert_eq!(axis, Axis::Vertical);
                assert!((sample.value + 1.0).abs() < 0.001);
                assert_eq!(sample.deadzone, 0.05);
            }
            other => panic!("Expected axis event, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_uses_device_range_and_flat() {
        let mut ranges = HashMap::new();
        ranges.insert(AbsoluteAxisType::ABS_RX.0, AxisRange::new(-100, 100, 10));
        let t = EvdevTranslator::new(AxisLayout::Standard, ranges, 0.05);

        match t.translate(&make_axis_event(AbsoluteAxisType::ABS_RX, 50)) {
            Some(ControlEvent::Axis { axis, sample }) => {
                assert_eq!(axis, Axis::Horizontal);
                assert!((sample.value - 0.5).abs() < 0.001);
                assert!((sample.deadzone - 0.1).abs() < 0.001);
            }
            other => panic!("Expected axis event, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_trigger() {
        let t = translator(AxisLayout::Standard);

        match t.translate(&make_axis_event(AbsoluteAxisType::ABS_RZ, 255)) {
            Some(ControlEvent::Axis { axis, sample }) => {
                assert_eq!(axis, Axis::RightTrigger);
                assert_eq!(sample.value, 1.0);
            }
            other => panic!("Expected axis event, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_hat() {
        let t = translator(AxisLayout::Generic);

        match t.translate(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, -1)) {
            Some(ControlEvent::Axis { axis, sample }) => {
                assert_eq!(axis, Axis::HatX);
                assert_eq!(sample.value, -1.0);
            }
            other => panic!("Expected axis event, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_keys() {
        let t = translator(AxisLayout::Standard);

        assert_eq!(
            t.translate(&make_key_event(EvKey::BTN_SOUTH, 1)),
            Some(ControlEvent::Key { key: Key::A, pressed: true })
        );
        assert_eq!(
            t.translate(&make_key_event(EvKey::BTN_SOUTH, 0)),
            Some(ControlEvent::Key { key: Key::A, pressed: false })
        );
        // Autorepeat counts as pressed
        assert_eq!(
            t.translate(&make_key_event(EvKey::BTN_NORTH, 2)),
            Some(ControlEvent::Key { key: Key::Y, pressed: true })
        );
    }

    #[test]
    fn test_unmapped_and_sync_events_ignored() {
        let t = translator(AxisLayout::Standard);

        assert_eq!(t.translate(&make_axis_event(AbsoluteAxisType::ABS_MISC, 10)), None);
        assert_eq!(t.translate(&InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)), None);
    }
}
