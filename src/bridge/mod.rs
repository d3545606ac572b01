//! # Method-Call Bridge Module
//!
//! Bidirectional method-call channel between this process and the vehicle UI.
//!
//! This module handles:
//! - Decoding inbound method calls (`initializeUsbJoystick`)
//! - Replying with a success string or a "not implemented" status
//! - Pushing `onJoystickData` with the encoded command record
//! - Carrying both directions as newline-delimited JSON (see [`stdio`])
//!
//! ## Wire Format
//!
//! ```text
//! <- {"id":1,"method":"initializeUsbJoystick"}
//! -> {"id":1,"status":"success","result":"USB Joystick Initialized"}
//! <- {"id":2,"method":"rumble"}
//! -> {"id":2,"status":"notImplemented"}
//! -> {"method":"onJoystickData","arguments":"{\"joyaqh\":\"D\",...}"}
//! ```

pub mod stdio;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::session::SessionHandle;

/// Default channel name announced to the UI.
pub const DEFAULT_CHANNEL: &str = "com.rccardt.rccar/usb_joystick";

/// Inbound method that scans for and registers the gamepad.
pub const METHOD_INITIALIZE: &str = "initializeUsbJoystick";

/// Outbound method carrying the encoded command record.
pub const METHOD_JOYSTICK_DATA: &str = "onJoystickData";

/// Result string of a completed initialization.
pub const INITIALIZED_RESULT: &str = "USB Joystick Initialized";

/// Inbound method call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    /// Correlation id echoed in the reply.
    #[serde(default)]
    pub id: Option<u64>,
    pub method: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Outcome of a method call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResult {
    Success { result: String },
    NotImplemented,
}

/// Reply to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub result: MethodResult,
}

/// Unsolicited call from this process to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub method: String,
    pub arguments: String,
}

/// Anything written to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Reply(MethodResponse),
    Push(PushMessage),
}

impl OutboundMessage {
    /// Wraps an encoded command record as an `onJoystickData` push.
    #[must_use]
    pub fn joystick_data(method: &str, payload: &str) -> Self {
        OutboundMessage::Push(PushMessage {
            method: method.to_string(),
            arguments: payload.to_string(),
        })
    }
}

/// Routes inbound method calls.
#[derive(Debug, Clone)]
pub struct MethodDispatcher {
    session: SessionHandle,
    publishing: Arc<watch::Sender<bool>>,
}

impl MethodDispatcher {
    /// Creates a dispatcher.
    ///
    /// `publishing` is switched on once the joystick has been initialized.
    #[must_use]
    pub fn new(session: SessionHandle, publishing: watch::Sender<bool>) -> Self {
        Self {
            session,
            publishing: Arc::new(publishing),
        }
    }

    /// Handles one call.
    pub async fn dispatch(&self, call: &MethodCall) -> MethodResult {
        match call.method.as_str() {
            METHOD_INITIALIZE => {
                match self.session.initialize().await {
                    Ok(state) => info!("Joystick initialized, session {:?}", state),
                    Err(e) => warn!("Joystick initialization incomplete: {}", e),
                }
                self.publishing.send_replace(true);
                MethodResult::Success {
                    result: INITIALIZED_RESULT.to_string(),
                }
            }
            other => {
                info!("Method not implemented: {}", other);
                MethodResult::NotImplemented
            }
        }
    }

    /// Handles one call and builds the reply.
    pub async fn respond(&self, call: &MethodCall) -> MethodResponse {
        MethodResponse {
            id: call.id,
            result: self.dispatch(call).await,
        }
    }
}
