//! # Command Record
//!
//! The latest decoded control intent of the gamepad, and the shared holder the
//! input side writes into and the publish loop reads from.
//!
//! ## Symbols
//!
//! | Field | Values | Wire key |
//! |-------|--------|----------|
//! | Drive (left stick Y) | `D` forward, `R` reverse, `P` neutral | `joyaqh` |
//! | Turn (right stick X) | `FXZ` left, `FXY` right, `FXP` centered | `joybzy` |
//! | Face button | `A`, `B`, `X`, `Y` | `btnabxy` |
//! | D-pad | `UP`, `DOWN`, `LEFT`, `RIGHT` | `udlr` |
//! | Left trigger | 0-90 | `lt` |
//! | Right trigger | 0-90 | `rt` |
//!
//! An unset symbol field is encoded as the empty string.
//!
//! ## Usage
//!
//! ```
//! use joystick_bridge::command::state::{CommandStore, Drive};
//!
//! let store = CommandStore::new();
//! store.update(|state| state.drive = Some(Drive::Forward));
//!
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.drive, Some(Drive::Forward));
//! ```

use std::sync::Arc;
use tokio::sync::watch;

/// Maximum throttle level produced from a fully pressed trigger.
pub const THROTTLE_MAX: u8 = 90;

/// Drive direction derived from the primary stick's vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// Stick pushed up (negative axis value).
    Forward,
    /// Stick pulled down (positive axis value).
    Reverse,
    /// Stick at rest.
    Neutral,
}

impl Drive {
    /// Wire symbol for this direction.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Drive::Forward => "D",
            Drive::Reverse => "R",
            Drive::Neutral => "P",
        }
    }
}

/// Turn direction derived from the secondary stick's horizontal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Left,
    Right,
    Centered,
}

impl Turn {
    /// Wire symbol for this direction.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Turn::Left => "FXZ",
            Turn::Right => "FXY",
            Turn::Centered => "FXP",
        }
    }
}

/// Face buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    X,
    Y,
}

impl Button {
    /// Wire symbol for this button.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
        }
    }
}

/// D-pad directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DPad {
    Up,
    Down,
    Left,
    Right,
}

impl DPad {
    /// Wire symbol for this direction.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            DPad::Up => "UP",
            DPad::Down => "DOWN",
            DPad::Left => "LEFT",
            DPad::Right => "RIGHT",
        }
    }
}

/// Latest decoded control state.
///
/// Every field is a pure projection of the most recent raw sample for that
/// control. `None` means the control has not reported anything yet (or, for
/// `button`, that the last digital event was a release).
///
/// # Examples
///
/// ```
/// use joystick_bridge::command::state::CommandState;
///
/// let state = CommandState::default();
/// assert!(state.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandState {
    pub drive: Option<Drive>,
    pub turn: Option<Turn>,
    /// Last pressed face button. Holds at most one symbol.
    pub button: Option<Button>,
    pub dpad: Option<DPad>,
    /// Left trigger level, 0 to [`THROTTLE_MAX`].
    pub throttle_left: u8,
    /// Right trigger level, 0 to [`THROTTLE_MAX`].
    pub throttle_right: u8,
}

impl CommandState {
    /// Creates an all-default state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every symbol field is unset and both throttles are 0.
    ///
    /// An empty state is never published.
    ///
    /// # Examples
    ///
    /// ```
    /// use joystick_bridge::command::state::{CommandState, Turn};
    ///
    /// let mut state = CommandState::new();
    /// assert!(state.is_empty());
    ///
    /// state.turn = Some(Turn::Centered);
    /// assert!(!state.is_empty());
    /// ```
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drive.is_none()
            && self.turn.is_none()
            && self.button.is_none()
            && self.dpad.is_none()
            && self.throttle_left == 0
            && self.throttle_right == 0
    }
}

/// Shared holder of the [`CommandState`].
///
/// One store is created at startup and handed by clone to the input side and
/// the publish loop. Writers replace the record as a whole, so a reader's
/// [`snapshot`](CommandStore::snapshot) never mixes fields from two updates.
#[derive(Debug, Clone)]
pub struct CommandStore {
    tx: Arc<watch::Sender<CommandState>>,
}

impl Default for CommandStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStore {
    /// Creates a store holding an all-default state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CommandState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Mutates the state in place under the store's lock.
    pub fn update<F>(&self, modify: F)
    where
        F: FnOnce(&mut CommandState),
    {
        self.tx.send_modify(modify);
    }

    /// Returns a consistent copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CommandState {
        self.tx.borrow().clone()
    }

    /// Restores the all-default state.
    pub fn reset(&self) {
        self.tx.send_replace(CommandState::default());
    }
}
