use crate::transport::LinkState;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerStatus {
    Pending,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl PeerStatus {
    /// `Disconnected` and `Failed` end a session instance for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }

    /// Status a link state maps onto, if any.
    pub fn from_link_state(state: LinkState) -> Option<Self> {
        match state {
            LinkState::New => None,
            LinkState::Connecting => Some(Self::Connecting),
            LinkState::Connected => Some(Self::Connected),
            LinkState::Disconnected | LinkState::Closed => Some(Self::Disconnected),
            LinkState::Failed => Some(Self::Failed),
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
