mod connection_wrapper;
mod convert;
mod data_channel;

pub use connection_wrapper::{WebRtcLink, WebRtcTransport};
pub use data_channel::WebRtcChannel;
