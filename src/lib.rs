//! # Joystick Bridge Library
//!
//! Drive your RC car from a USB gamepad.
//!
//! This library turns gamepad input into compact drive/turn/button/throttle
//! command records and publishes them to the vehicle UI over a method-call
//! bridge.

pub mod bridge;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod publish;
pub mod session;
