mod link;
mod transport_config;
mod transport_event;
pub mod webrtc;

pub use link::*;
pub use transport_config::*;
pub use transport_event::*;
