//! # pairchain-protocol — coordinator channel contract.
//!
//! Defines the newline-delimited JSON frames exchanged with the trusted
//! coordinator, the session bookkeeping those frames drive, and the
//! outbound queue the transport drains.
//!
//! Inbound frames decode through [`InboundMessage::decode`] exactly once
//! at the channel boundary; everything past that point works with typed
//! values. Outbound frames go through [`ChannelHandle::send`], which
//! validates before encoding and drops frames while the link is down.

pub mod channel;
pub mod error;
pub mod message;
pub mod session;

pub use channel::{ChannelEvent, ChannelHandle, outbound_channel};
pub use error::ProtocolError;
pub use message::{InboundMessage, OutboundMessage, decode_blocks};
pub use session::SessionState;
