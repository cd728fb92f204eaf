//! Outbound frame channel between the node logic and the transport.
//!
//! Handlers never touch the socket. They push encoded lines through a
//! [`ChannelHandle`]; the transport drains them in order. While the
//! link is down the handle swallows frames instead of erroring, so
//! periodic work keeps running unchanged across reconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::message::OutboundMessage;

/// What the transport reports to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Link established; the node should send its handshake.
    Opened,
    /// One inbound line, undecoded.
    Frame(String),
    /// Link lost; session state must be reset.
    Closed,
}

/// Cloneable sender side of the outbound queue.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
}

impl ChannelHandle {
    /// Encode and queue a frame. Returns `Ok` without queueing while
    /// the link is down; encoding failures still surface.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), ProtocolError> {
        let line = message.encode()?;
        if !self.is_connected() {
            return Ok(());
        }
        self.outbound
            .send(line)
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Flipped by the transport on connect and disconnect.
    pub fn mark_connected(&self, up: bool) {
        self.connected.store(up, Ordering::SeqCst);
    }
}

/// Build the outbound queue; the receiver goes to the transport.
pub fn outbound_channel() -> (ChannelHandle, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = ChannelHandle {
        outbound: tx,
        connected: Arc::new(AtomicBool::new(false)),
    };
    (handle, rx)
}
