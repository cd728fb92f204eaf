//! Error type for the wire protocol layer.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")] Malformed(String),
    #[error("encode: {0}")] Encode(String),
    #[error("fork report carries {count} anchors, limit {max}")] TooManyAnchors { count: usize, max: usize },
    #[error("channel closed")] ChannelClosed,
}
