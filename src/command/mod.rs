//! # Command Module
//!
//! The decoded control state and its outbound encoding.
//!
//! This module handles:
//! - Holding the latest drive, turn, button, D-pad and trigger values
//! - Sharing that record between the input side and the publish loop
//! - Encoding it as the JSON object the vehicle UI consumes

pub mod encoder;
pub mod state;
