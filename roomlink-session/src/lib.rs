pub mod config;
pub mod error;
pub mod peer;
pub mod queue;
pub mod relay;
pub mod session;
pub mod transfer;
pub mod transport;

pub use config::*;
pub use error::*;
pub use peer::{Inbound, PeerSession, PeerStatus, PendingSends, UploadJob};
pub use queue::*;
pub use relay::*;
pub use session::*;
pub use transfer::*;
pub use transport::{
    Channel, ChannelId, ChannelPayload, IceServerConfig, Link, LinkState, LinkTag, Transport,
    TransportConfig, TransportEvent,
};
pub use transport::webrtc::{WebRtcChannel, WebRtcLink, WebRtcTransport};
