//! # Controller Module
//!
//! Gamepad input handling.
//!
//! This module handles:
//! - Applying device dead-zones to analog samples
//! - Quantizing sticks, triggers and hat into command symbols
//! - Mapping button and D-pad presses onto the command record
//! - Translating Linux evdev events into host-neutral control events

pub mod calibration;
pub mod evdev_source;
pub mod mapper;
