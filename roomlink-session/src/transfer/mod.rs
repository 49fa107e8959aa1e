mod incoming;
mod outgoing;
mod outgoing_file;
mod window;

pub use incoming::*;
pub use outgoing::*;
pub use outgoing_file::*;
pub use window::*;
