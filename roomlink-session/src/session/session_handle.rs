use crate::error::SessionError;
use crate::session::{SessionCommand, SessionSnapshot};
use crate::transfer::OutgoingFile;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Cloneable front door to a running `SessionManager`.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshot: watch::Receiver<Arc<SessionSnapshot>>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<SessionCommand>,
        snapshot: watch::Receiver<Arc<SessionSnapshot>>,
    ) -> Self {
        Self { commands, snapshot }
    }

    /// Asks the relay to join `code`. The room identity is set once the
    /// relay confirms.
    pub async fn join_room(&self, code: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::JoinRoom { code: code.into() })
            .await
    }

    pub async fn broadcast_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::BroadcastText { text: text.into() })
            .await
    }

    pub async fn broadcast_file(&self, file: OutgoingFile) -> Result<(), SessionError> {
        self.send(SessionCommand::BroadcastFile { file }).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown).await
    }

    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.snapshot.clone()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Stopped)
    }
}
