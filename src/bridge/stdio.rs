//! Newline-delimited JSON transport for the method-call bridge.
//!
//! One task reads calls from the UI and answers them; one task owns the
//! output and writes replies and pushes in the order they were queued.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{MethodCall, MethodDispatcher, OutboundMessage};
use crate::error::{BridgeError, Result};

/// Reads method calls line by line until end of input.
///
/// Blank lines are skipped; lines that are not valid UTF-8 JSON calls are
/// logged and skipped.
///
/// # Errors
///
/// Returns `Io` if reading fails, or `ChannelClosed` if the writer has gone.
pub async fn run_reader<R>(
    mut input: R,
    dispatcher: MethodDispatcher,
    outbound: mpsc::Sender<OutboundMessage>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let call: MethodCall = match serde_json::from_slice(&buf) {
            Ok(call) => call,
            Err(e) => {
                warn!(
                    "Ignoring malformed method call {:?}: {}",
                    String::from_utf8_lossy(&buf).trim_end(),
                    e
                );
                continue;
            }
        };

        debug!("Method call: {}", call.method);
        let response = dispatcher.respond(&call).await;

        outbound
            .send(OutboundMessage::Reply(response))
            .await
            .map_err(|_| BridgeError::ChannelClosed("bridge writer".to_string()))?;
    }

    debug!("Bridge input closed");
    Ok(())
}

/// Writes every queued message as one JSON line until all senders are gone.
///
/// # Errors
///
/// Returns `Serialization` or `Io` if a message cannot be written.
pub async fn run_writer<W>(mut rx: mpsc::Receiver<OutboundMessage>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }

    Ok(())
}
