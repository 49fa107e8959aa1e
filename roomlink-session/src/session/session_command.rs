use crate::transfer::OutgoingFile;

/// Requests from the presentation layer to the session manager.
#[derive(Debug)]
pub enum SessionCommand {
    JoinRoom { code: String },

    BroadcastText { text: String },

    BroadcastFile { file: OutgoingFile },

    Shutdown,
}
