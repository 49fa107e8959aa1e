use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Session description as browsers serialize it: `{"type": "offer", "sdp": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// Envelopes this client sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEnvelope {
    Join {
        room: String,
    },
    Offer {
        to: PeerId,
        sdp: SessionDescription,
    },
    Answer {
        to: PeerId,
        sdp: SessionDescription,
    },
    Candidate {
        to: PeerId,
        candidate: IceCandidate,
    },
}

impl ClientEnvelope {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
        }
    }
}

/// Envelopes the relay sends to this client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RelayEnvelope {
    RoomAssigned {
        room: String,
        name: String,
    },
    RoomJoined {
        room: String,
        name: String,
    },
    NewPeer {
        id: PeerId,
    },
    Offer {
        from: PeerId,
        sdp: SessionDescription,
    },
    Answer {
        from: PeerId,
        sdp: SessionDescription,
    },
    Candidate {
        from: PeerId,
        candidate: IceCandidate,
    },
    PeerLeft {
        id: PeerId,
    },
    /// Any `type` this client does not understand.
    #[serde(other)]
    Unknown,
}

impl RelayEnvelope {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomAssigned { .. } => "room-assigned",
            Self::RoomJoined { .. } => "room-joined",
            Self::NewPeer { .. } => "new-peer",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::PeerLeft { .. } => "peer-left",
            Self::Unknown => "unknown",
        }
    }
}
