mod conversation;
mod session_command;
mod session_event;
mod session_handle;
mod session_manager;
mod snapshot;

pub use conversation::*;
pub use session_command::*;
pub use session_event::*;
pub use session_handle::*;
pub use session_manager::*;
pub use snapshot::*;
