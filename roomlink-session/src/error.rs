use roomlink_core::{PeerId, TransferId};
use thiserror::Error;

/// Failures reported by the point-to-point transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel is not open")]
    ChannelClosed,

    #[error("invalid session description: {0}")]
    InvalidDescription(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay connection is not open")]
    NotConnected,

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("relay outbox: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full ({capacity} items)")]
    Full { capacity: usize },
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer cancelled: peer session ended")]
    Cancelled,

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to encode metadata: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Protocol violations. None of them is fatal: each is logged and the
/// offending input is dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("{kind} from {peer} matches no live session")]
    SignalingOrderViolation { peer: PeerId, kind: &'static str },

    #[error("malformed payload from {peer}: {reason}")]
    MalformedPayload { peer: PeerId, reason: String },

    #[error("binary chunk from {peer} matches no active transfer on its channel")]
    UnattributedChunk { peer: PeerId },

    #[error("chunk of {chunk} bytes overflows transfer {transfer} ({remaining} bytes left)")]
    TransferOverflow {
        transfer: TransferId,
        chunk: usize,
        remaining: u64,
    },

    #[error("transfer {transfer} is already registered on this channel")]
    DuplicateTransfer { transfer: TransferId },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session manager has stopped")]
    Stopped,
}
