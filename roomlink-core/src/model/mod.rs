mod channel;
mod peer;
mod relay;
mod room;
mod transfer;

pub use channel::{ChannelMessage, ChatMessage, FileMetadata};
pub use peer::PeerId;
pub use relay::{ClientEnvelope, IceCandidate, RelayEnvelope, SdpKind, SessionDescription};
pub use room::RoomIdentity;
pub use transfer::TransferId;
