use crate::transport::Channel;
use bytes::Bytes;
use roomlink_core::{IceCandidate, PeerId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one link instance. `link_id` changes every time a session
/// for the same peer is rebuilt, so events from a torn-down link can be
/// told apart from the live one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkTag {
    pub peer_id: PeerId,
    pub link_id: u64,
}

impl fmt::Display for LinkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.peer_id, self.link_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl ChannelId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelPayload {
    Text(String),
    Binary(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Everything a link reports back to the session manager.
pub enum TransportEvent {
    /// A channel (eager local or remotely created) is open and writable.
    ChannelOpen(LinkTag, Arc<dyn Channel>),

    ChannelClosed(LinkTag, ChannelId),

    Message(LinkTag, ChannelId, ChannelPayload),

    StateChanged(LinkTag, LinkState),

    /// A local candidate was gathered and must be relayed to the peer.
    CandidateGenerated(LinkTag, IceCandidate),
}

impl TransportEvent {
    pub fn tag(&self) -> &LinkTag {
        match self {
            Self::ChannelOpen(tag, _)
            | Self::ChannelClosed(tag, _)
            | Self::Message(tag, _, _)
            | Self::StateChanged(tag, _)
            | Self::CandidateGenerated(tag, _) => tag,
        }
    }
}
