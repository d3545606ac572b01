//! Trait abstraction for command delivery to enable testing

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::bridge::OutboundMessage;
use crate::error::{BridgeError, Result};

/// Destination of encoded command records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandSink: Send {
    /// Deliver one encoded command record
    async fn deliver(&mut self, payload: &str) -> Result<()>;
}

/// Sink that pushes records onto the bridge's outbound queue
///
/// Delivery never waits: when the queue is full the record is dropped, since
/// the next tick carries a fresher snapshot anyway.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OutboundMessage>,
    method: String,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<OutboundMessage>, method: impl Into<String>) -> Self {
        Self {
            tx,
            method: method.into(),
        }
    }
}

#[async_trait]
impl CommandSink for ChannelSink {
    async fn deliver(&mut self, payload: &str) -> Result<()> {
        match self
            .tx
            .try_send(OutboundMessage::joystick_data(&self.method, payload))
        {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full, dropping command record");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                Err(BridgeError::ChannelClosed("bridge writer".to_string()))
            }
        }
    }
}
