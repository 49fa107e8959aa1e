use crate::peer::PeerStatus;
use crate::transfer::CompletedFile;
use roomlink_core::{ChatMessage, PeerId, RoomIdentity, TransferId};

/// Feed of everything the presentation layer may want to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RoomJoined(RoomIdentity),

    PeerStatusChanged {
        peer: PeerId,
        status: PeerStatus,
    },

    /// The peer left; its session and unfinished transfers are gone.
    PeerRemoved {
        peer: PeerId,
    },

    ChatReceived {
        peer: PeerId,
        message: ChatMessage,
    },

    /// A file was announced; progress starts at 0.
    IncomingFileStarted {
        peer: PeerId,
        transfer_id: TransferId,
        sender: String,
        filename: String,
        mime_type: String,
        size: u64,
    },

    IncomingFileProgress {
        peer: PeerId,
        transfer_id: TransferId,
        progress: u8,
        bytes_received: u64,
    },

    IncomingFileCompleted {
        peer: PeerId,
        file: CompletedFile,
    },

    IncomingFileFailed {
        peer: PeerId,
        transfer_id: TransferId,
        reason: String,
    },

    OutgoingFileProgress {
        peer: PeerId,
        transfer_id: TransferId,
        bytes_sent: u64,
        total_size: u64,
    },

    OutgoingFileCompleted {
        peer: PeerId,
        transfer_id: TransferId,
    },

    OutgoingFileFailed {
        peer: PeerId,
        transfer_id: TransferId,
        reason: String,
    },
}
