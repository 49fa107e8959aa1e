use crate::error::TransportError;
use crate::transport::{ChannelId, LinkTag, TransportEvent};
use async_trait::async_trait;
use bytes::Bytes;
use roomlink_core::{IceCandidate, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Factory for point-to-point links.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Creates a link whose callbacks report into `events`, tagged with `tag`.
    async fn create_link(
        &self,
        tag: LinkTag,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn Link>, TransportError>;
}

/// One negotiated (or negotiating) connection to a single peer.
#[async_trait]
pub trait Link: Send + Sync {
    /// Opens a local channel eagerly. It is reported through
    /// `TransportEvent::ChannelOpen` once writable.
    async fn create_channel(&self, label: &str) -> Result<(), TransportError>;

    /// Generates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    /// Generates an answer and installs it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_remote_description(&self, desc: SessionDescription)
    -> Result<(), TransportError>;

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// A reliable, ordered message channel over a link.
#[async_trait]
pub trait Channel: Send + Sync {
    fn id(&self) -> ChannelId;

    fn label(&self) -> String;

    fn is_open(&self) -> bool;

    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    async fn send_binary(&self, data: Bytes) -> Result<(), TransportError>;

    /// Bytes accepted by `send_*` but not yet handed to the network.
    async fn buffered_amount(&self) -> usize;

    /// Resolves when the transport reports the buffer drained below its low
    /// threshold. Transports without such a signal never resolve, leaving
    /// callers on their polling fallback.
    async fn buffered_amount_low(&self) {
        std::future::pending::<()>().await
    }
}
