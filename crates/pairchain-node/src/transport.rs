//! NDJSON transport to the coordinator.
//!
//! One TCP connection carries newline-delimited JSON frames both ways.
//! The task reconnects with a fixed delay until the attempt budget is
//! spent; every (re)connection emits `Opened` so the node re-announces
//! itself, and every drop emits `Closed` so the session resets.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use pairchain_core::constants::RECONNECT_DELAY_SECS;
use pairchain_protocol::{ChannelEvent, ChannelHandle};

use crate::error::NodeError;

enum LinkEnd {
    Reconnect,
    Shutdown,
}

/// Owns the coordinator connection for the life of the process.
pub struct CoordinatorTransport {
    addr: String,
    max_attempts: u32,
    reconnect_delay: Duration,
    handle: ChannelHandle,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl CoordinatorTransport {
    pub fn new(
        addr: impl Into<String>,
        max_attempts: u32,
        handle: ChannelHandle,
        outbound: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Self {
        Self {
            addr: addr.into(),
            max_attempts,
            reconnect_delay: Duration::from_secs(RECONNECT_DELAY_SECS),
            handle,
            outbound,
            events,
        }
    }

    /// Override the delay between connection attempts.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Connect, pump frames, reconnect. Returns `Ok` on orderly
    /// shutdown (the node or every sender went away) and
    /// [`NodeError::Unreachable`] once consecutive connection attempts
    /// exceed the budget.
    pub async fn run(mut self) -> Result<(), NodeError> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let stream = match TcpStream::connect(&self.addr).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, addr = %self.addr, attempt = attempts, "coordinator connect failed");
                    if attempts >= self.max_attempts {
                        return Err(NodeError::Unreachable(attempts));
                    }
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };
            info!(addr = %self.addr, "connected to coordinator");
            attempts = 0;

            self.handle.mark_connected(true);
            if self.events.send(ChannelEvent::Opened).is_err() {
                return Ok(());
            }

            let end = self.pump(stream).await;

            self.handle.mark_connected(false);
            if self.events.send(ChannelEvent::Closed).is_err() {
                return Ok(());
            }
            if let LinkEnd::Shutdown = end {
                return Ok(());
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Pump one established connection until it drops or the node goes
    /// away.
    async fn pump(&mut self, stream: TcpStream) -> LinkEnd {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if self.events.send(ChannelEvent::Frame(line)).is_err() {
                            return LinkEnd::Shutdown;
                        }
                    }
                    Ok(None) => {
                        info!("coordinator closed the connection");
                        return LinkEnd::Reconnect;
                    }
                    Err(e) => {
                        warn!(error = %e, "coordinator read failed");
                        return LinkEnd::Reconnect;
                    }
                },
                frame = self.outbound.recv() => match frame {
                    Some(mut line) => {
                        line.push('\n');
                        if let Err(e) = write_half.write_all(line.as_bytes()).await {
                            warn!(error = %e, "coordinator write failed");
                            return LinkEnd::Reconnect;
                        }
                    }
                    None => return LinkEnd::Shutdown,
                },
            }
        }
    }
}
