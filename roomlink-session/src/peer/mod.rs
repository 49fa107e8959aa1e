mod peer_session;
mod peer_status;
mod upload_worker;

pub use peer_session::*;
pub use peer_status::*;
pub use upload_worker::*;
