//! # Command Encoder
//!
//! Serializes a [`CommandState`] into the compact JSON object consumed by the
//! vehicle UI.
//!
//! ## Wire Format
//!
//! ```text
//! {"joyaqh":"D","joybzy":"FXP","btnabxy":"A","udlr":"","lt":45,"rt":0}
//! ```
//!
//! All six keys are always present, in this order. Unset symbols are `""`.

use serde::Serialize;

use super::state::CommandState;
use crate::error::Result;

/// Borrowed view of a [`CommandState`] in wire layout.
#[derive(Debug, Serialize)]
struct CommandPayload<'a> {
    joyaqh: &'a str,
    joybzy: &'a str,
    btnabxy: &'a str,
    udlr: &'a str,
    lt: u8,
    rt: u8,
}

impl<'a> From<&'a CommandState> for CommandPayload<'a> {
    fn from(state: &'a CommandState) -> Self {
        Self {
            joyaqh: state.drive.map_or("", |d| d.symbol()),
            joybzy: state.turn.map_or("", |t| t.symbol()),
            btnabxy: state.button.map_or("", |b| b.symbol()),
            udlr: state.dpad.map_or("", |d| d.symbol()),
            lt: state.throttle_left,
            rt: state.throttle_right,
        }
    }
}

/// Encodes the state as a JSON object string.
///
/// Encoding is deterministic: the same state always yields byte-identical
/// output.
///
/// # Errors
///
/// Returns `Serialization` if JSON encoding fails.
///
/// # Examples
///
/// ```
/// use joystick_bridge::command::encoder::encode_command;
/// use joystick_bridge::command::state::CommandState;
///
/// let json = encode_command(&CommandState::default())?;
/// assert_eq!(json, r#"{"joyaqh":"","joybzy":"","btnabxy":"","udlr":"","lt":0,"rt":0}"#);
/// # Ok::<(), joystick_bridge::error::BridgeError>(())
/// ```
pub fn encode_command(state: &CommandState) -> Result<String> {
    Ok(serde_json::to_string(&CommandPayload::from(state))?)
}

/// Encodes the state if it is worth publishing.
///
/// Returns `None` for an all-default state or an empty encoding.
///
/// # Errors
///
/// Returns `Serialization` if JSON encoding fails.
pub fn encode_for_publish(state: &CommandState) -> Result<Option<String>> {
    if state.is_empty() {
        return Ok(None);
    }

    let encoded = encode_command(state)?;
    if encoded.is_empty() {
        return Ok(None);
    }

    Ok(Some(encoded))
}
