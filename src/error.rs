//! # Error Types
//!
//! Custom error types for Joystick Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Joystick Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Command record could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input device could not be opened or read
    #[error("Device error: {0}")]
    Device(String),

    /// No input device with the given identity is present
    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    /// A task on the other end of a queue has gone away
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

/// Result type alias for Joystick Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
