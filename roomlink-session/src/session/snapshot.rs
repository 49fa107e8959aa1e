use crate::peer::PeerStatus;
use crate::session::ConversationEntry;
use roomlink_core::{PeerId, RoomIdentity};
use std::collections::BTreeMap;

/// Point-in-time view of one peer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub status: PeerStatus,
    /// Messages and files waiting for the channel.
    pub queued: usize,
    pub incoming_transfers: usize,
    pub channel_open: bool,
}

/// Immutable copy of the session state. A new one is published after every
/// change; readers never see a half-applied update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub room: Option<RoomIdentity>,
    pub relay_open: bool,
    pub peers: BTreeMap<PeerId, PeerSnapshot>,
    pub conversation: Vec<ConversationEntry>,
}

impl SessionSnapshot {
    pub fn peer(&self, id: &PeerId) -> Option<&PeerSnapshot> {
        self.peers.get(id)
    }
}
