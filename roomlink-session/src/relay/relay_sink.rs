use crate::error::RelayError;
use async_trait::async_trait;

/// Outgoing half of the relay connection.
#[async_trait]
pub trait RelaySink: Send + Sync {
    /// Sends one serialized envelope.
    async fn send(&self, text: String) -> Result<(), RelayError>;
}

/// Incoming half of the relay connection, as seen by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Opened,
    Message(String),
    Closed,
}
