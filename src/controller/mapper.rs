//! # Controller Input Mapper Module
//!
//! This module turns host-neutral [`ControlEvent`]s into updates of the shared
//! [`CommandState`](crate::command::state::CommandState).
//!
//! ## Analog Controls
//!
//! | Control | [`Axis`] | Effect |
//! |---------|----------|--------|
//! | Left stick Y | `Vertical` | drive (`D` / `R` / `P`) |
//! | Right stick X | `Horizontal` | turn (`FXZ` / `FXY` / `FXP`) |
//! | LT / L2 | `LeftTrigger` | `lt` 0-90 |
//! | RT / R2 | `RightTrigger` | `rt` 0-90 |
//! | Hat X / Y | `HatX`, `HatY` | D-pad |
//!
//! ## Digital Controls
//!
//! | Control | [`Key`] | Effect on press |
//! |---------|---------|-----------------|
//! | A / B / X / Y | `A`, `B`, `X`, `Y` | button slot |
//! | D-pad | `DpadUp`, `DpadDown`, `DpadLeft`, `DpadRight` | D-pad |
//!
//! Releasing any key clears the button slot, whichever key it was. The D-pad
//! keeps its last direction until [`ControlEvent::Reset`] says the device is
//! gone. Unmapped keys change nothing but are still
//! reported as consumed so the host does not act on them.
//!
//! ## Usage
//!
//! ```
//! use joystick_bridge::command::state::{Button, CommandStore};
//! use joystick_bridge::controller::mapper::{ControlEvent, EventMapper, Key};
//!
//! let store = CommandStore::new();
//! let mut mapper = EventMapper::new(store.clone());
//!
//! mapper.process_event(&ControlEvent::Key { key: Key::A, pressed: true });
//! assert_eq!(store.snapshot().button, Some(Button::A));
//! ```

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::calibration::{normalize_axis, AxisEncoder};
use crate::command::state::{Button, CommandState, CommandStore, DPad};

/// One analog sample with the device-reported dead-zone for its axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSample {
    pub value: f32,
    pub deadzone: f32,
}

impl AxisSample {
    #[must_use]
    pub fn new(value: f32, deadzone: f32) -> Self {
        Self { value, deadzone }
    }
}

/// Analog controls the mapper understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Primary stick vertical axis.
    Vertical,
    /// Secondary stick horizontal axis.
    Horizontal,
    LeftTrigger,
    RightTrigger,
    HatX,
    HatY,
}

/// Digital controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A,
    B,
    X,
    Y,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    /// Any key with no command meaning, by host key code.
    Other(u16),
}

/// A complete joystick motion sample, as delivered by hosts that report all
/// axes of a pad in one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionFrame {
    pub vertical: AxisSample,
    pub horizontal: AxisSample,
    /// Left trigger pressure, 0.0 to 1.0.
    pub left_trigger: f32,
    /// Right trigger pressure, 0.0 to 1.0.
    pub right_trigger: f32,
}

/// Host-neutral input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    Axis { axis: Axis, sample: AxisSample },
    Key { key: Key, pressed: bool },
    Motion(MotionFrame),
    /// The device that produced earlier events is gone.
    Reset,
}

/// Applies control events to a [`CommandStore`].
///
/// # Thread Safety
///
/// `EventMapper` itself is used from the single input-dispatch task; the store
/// it writes to may be read concurrently.
#[derive(Debug)]
pub struct EventMapper {
    store: CommandStore,
    encoder: AxisEncoder,
    hat_x: f32,
    hat_y: f32,
}

impl EventMapper {
    /// Creates a mapper with the default encoding thresholds.
    #[must_use]
    pub fn new(store: CommandStore) -> Self {
        Self::with_encoder(store, AxisEncoder::default())
    }

    /// Creates a mapper with explicit encoding thresholds.
    #[must_use]
    pub fn with_encoder(store: CommandStore, encoder: AxisEncoder) -> Self {
        Self {
            store,
            encoder,
            hat_x: 0.0,
            hat_y: 0.0,
        }
    }

    /// Applies one event. Always returns `true` (the event is consumed).
    pub fn process_event(&mut self, event: &ControlEvent) -> bool {
        match *event {
            ControlEvent::Axis { axis, sample } => self.process_axis_event(axis, sample),
            ControlEvent::Key { key, pressed } => self.process_key_event(key, pressed),
            ControlEvent::Motion(frame) => self.process_motion(&frame),
            ControlEvent::Reset => self.reset(),
        }
        true
    }

    /// Applies a whole motion sample as one update.
    fn process_motion(&mut self, frame: &MotionFrame) {
        let encoder = self.encoder;
        self.store.update(|state| {
            Self::apply_vertical(&encoder, state, frame.vertical);
            Self::apply_horizontal(&encoder, state, frame.horizontal);
            state.throttle_left = encoder.trigger(frame.left_trigger);
            state.throttle_right = encoder.trigger(frame.right_trigger);
        });
        debug!(
            "Motion: y={:.2} x={:.2} lt={:.2} rt={:.2}",
            frame.vertical.value, frame.horizontal.value, frame.left_trigger, frame.right_trigger
        );
    }

    fn process_axis_event(&mut self, axis: Axis, sample: AxisSample) {
        let encoder = self.encoder;
        match axis {
            Axis::Vertical => {
                self.store
                    .update(|state| Self::apply_vertical(&encoder, state, sample));
            }
            Axis::Horizontal => {
                self.store
                    .update(|state| Self::apply_horizontal(&encoder, state, sample));
            }
            Axis::LeftTrigger => {
                self.store
                    .update(|state| state.throttle_left = encoder.trigger(sample.value));
            }
            Axis::RightTrigger => {
                self.store
                    .update(|state| state.throttle_right = encoder.trigger(sample.value));
            }
            Axis::HatX | Axis::HatY => {
                if axis == Axis::HatX {
                    self.hat_x = sample.value;
                } else {
                    self.hat_y = sample.value;
                }
                let dpad = encoder.dpad_hat(self.hat_x, self.hat_y);
                self.store.update(|state| state.dpad = dpad);
            }
        }
    }

    fn process_key_event(&mut self, key: Key, pressed: bool) {
        if !pressed {
            self.store.update(|state| state.button = None);
            return;
        }

        match key {
            Key::A => self.set_button(Button::A),
            Key::B => self.set_button(Button::B),
            Key::X => self.set_button(Button::X),
            Key::Y => self.set_button(Button::Y),
            Key::DpadUp => self.set_dpad(DPad::Up),
            Key::DpadDown => self.set_dpad(DPad::Down),
            Key::DpadLeft => self.set_dpad(DPad::Left),
            Key::DpadRight => self.set_dpad(DPad::Right),
            Key::Other(code) => debug!("Ignoring unmapped key {}", code),
        }
    }

    fn set_button(&self, button: Button) {
        self.store.update(|state| state.button = Some(button));
    }

    fn set_dpad(&self, dpad: DPad) {
        self.store.update(|state| state.dpad = Some(dpad));
    }

    fn apply_vertical(encoder: &AxisEncoder, state: &mut CommandState, sample: AxisSample) {
        state.drive = Some(encoder.drive(normalize_axis(sample.value, sample.deadzone)));
    }

    fn apply_horizontal(encoder: &AxisEncoder, state: &mut CommandState, sample: AxisSample) {
        state.turn = Some(encoder.turn(normalize_axis(sample.value, sample.deadzone)));
    }

    /// Clears the store and the remembered hat position.
    fn reset(&mut self) {
        self.hat_x = 0.0;
        self.hat_y = 0.0;
        self.store.reset();
    }

    /// Input-dispatch loop: applies queued events in arrival order.
    ///
    /// Returns the number of events applied once `shutdown` turns `true` or
    /// every sender has gone.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ControlEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> u64 {
        let mut processed: u64 = 0;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Input queue closed");
                        break;
                    };
                    self.process_event(&event);
                    processed += 1;
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Input dispatch stopped after {} events", processed);
        processed
    }
}
