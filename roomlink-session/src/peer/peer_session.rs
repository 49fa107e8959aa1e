use crate::config::SessionConfig;
use crate::error::{ProtocolError, TransportError};
use crate::peer::{PeerStatus, UploadJob, spawn_upload_worker};
use crate::queue::{Enqueued, Queue};
use crate::relay::RelayOutbox;
use crate::session::{PeerSnapshot, SessionEvent};
use crate::transfer::{
    ChannelReceiver, ChunkOutcome, CompletedFile, FlowControl, IncomingTransfer, Registered,
};
use crate::transport::{Channel, ChannelId, ChannelPayload, Link, LinkState, LinkTag, Transport, TransportEvent};
use roomlink_core::{
    ChannelMessage, ChatMessage, ClientEnvelope, FileMetadata, IceCandidate, PeerId,
    SessionDescription, TransferId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// What an inbound channel message turned into.
#[derive(Debug)]
pub enum Inbound {
    Chat(ChatMessage),
    FileAnnounced(FileMetadata),
    FileProgress {
        transfer_id: TransferId,
        progress: u8,
        bytes_received: u64,
    },
    FileCompleted(CompletedFile),
}

/// Sends that never reached a channel.
#[derive(Debug, Default)]
pub struct PendingSends {
    pub texts: Vec<String>,
    pub uploads: Vec<UploadJob>,
}

/// Everything this client holds for one remote participant.
///
/// Owned and mutated only by the session manager's task. A session whose
/// status turned terminal is never revived; the manager replaces it with a
/// fresh instance under a new `link_id`.
pub struct PeerSession {
    id: PeerId,
    link_id: u64,
    status: PeerStatus,
    link: Option<Arc<dyn Link>>,
    channel: Option<Arc<dyn Channel>>,
    outgoing: Queue<String>,
    pending_uploads: Queue<UploadJob>,
    uploads: Option<mpsc::UnboundedSender<UploadJob>>,
    receivers: HashMap<ChannelId, ChannelReceiver>,
    pending_candidates: Vec<IceCandidate>,
    remote_description_set: bool,
    alive: watch::Sender<bool>,
    flow: FlowControl,
    channel_label: String,
}

impl PeerSession {
    /// Creates the session and its link. A link that cannot be created
    /// leaves the session `Failed` rather than erroring out.
    pub(crate) async fn open(
        id: PeerId,
        link_id: u64,
        transport: &dyn Transport,
        events: mpsc::Sender<TransportEvent>,
        config: &SessionConfig,
    ) -> Self {
        let tag = LinkTag {
            peer_id: id.clone(),
            link_id,
        };
        let (alive, _) = watch::channel(true);

        let (link, status) = match transport.create_link(tag, events).await {
            Ok(link) => (Some(link), PeerStatus::Pending),
            Err(e) => {
                error!(peer = %id, error = %e, "failed to create link");
                alive.send_replace(false);
                (None, PeerStatus::Failed)
            }
        };

        Self {
            id,
            link_id,
            status,
            link,
            channel: None,
            outgoing: Queue::new(config.peer_queue_capacity, config.overflow_policy),
            pending_uploads: Queue::new(config.peer_queue_capacity, config.overflow_policy),
            uploads: None,
            receivers: HashMap::new(),
            pending_candidates: Vec::new(),
            remote_description_set: false,
            alive,
            flow: FlowControl::from(config),
            channel_label: config.channel_label.clone(),
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    pub fn status(&self) -> PeerStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn channel_open(&self) -> bool {
        self.channel.as_ref().is_some_and(|c| c.is_open())
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            status: self.status,
            queued: self.outgoing.len() + self.pending_uploads.len(),
            incoming_transfers: self.receivers.values().map(ChannelReceiver::len).sum(),
            channel_open: self.channel_open(),
        }
    }

    /// Offering side: eager channel, local offer, offer envelope.
    pub(crate) async fn start_call(&mut self, relay: &mut RelayOutbox) {
        let Some(link) = self.link.clone() else {
            return;
        };

        if let Err(e) = link.create_channel(&self.channel_label).await {
            debug!(peer = %self.id, error = %e, "no eager channel, waiting for the remote one");
        }

        match link.create_offer().await {
            Ok(offer) => {
                self.signal(
                    relay,
                    ClientEnvelope::Offer {
                        to: self.id.clone(),
                        sdp: offer,
                    },
                )
                .await;
                self.set_status(PeerStatus::Connecting);
            }
            Err(e) => self.fail("create offer", e),
        }
    }

    /// Answering side: remote offer, local answer, answer envelope.
    pub(crate) async fn accept_offer(&mut self, offer: SessionDescription, relay: &mut RelayOutbox) {
        let Some(link) = self.link.clone() else {
            return;
        };

        if let Err(e) = link.set_remote_description(offer).await {
            self.fail("apply offer", e);
            return;
        }
        self.remote_description_set = true;
        self.flush_candidates(&link).await;

        match link.create_answer().await {
            Ok(answer) => {
                self.signal(
                    relay,
                    ClientEnvelope::Answer {
                        to: self.id.clone(),
                        sdp: answer,
                    },
                )
                .await;
                self.set_status(PeerStatus::Connecting);
            }
            Err(e) => self.fail("create answer", e),
        }
    }

    pub(crate) async fn accept_answer(&mut self, answer: SessionDescription) {
        let Some(link) = self.link.clone() else {
            return;
        };

        match link.set_remote_description(answer).await {
            Ok(()) => {
                self.remote_description_set = true;
                self.flush_candidates(&link).await;
            }
            Err(e) => warn!(peer = %self.id, error = %e, "failed to apply answer"),
        }
    }

    /// Candidates that arrive before a remote description are held until
    /// one is set.
    pub(crate) async fn add_candidate(&mut self, candidate: IceCandidate) {
        let Some(link) = self.link.clone() else {
            return;
        };

        if !self.remote_description_set {
            debug!(peer = %self.id, "buffering early candidate");
            self.pending_candidates.push(candidate);
            return;
        }

        if let Err(e) = link.add_candidate(candidate).await {
            warn!(peer = %self.id, error = %e, "failed to add candidate");
        }
    }

    async fn flush_candidates(&mut self, link: &Arc<dyn Link>) {
        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = link.add_candidate(candidate).await {
                warn!(peer = %self.id, error = %e, "failed to add buffered candidate");
            }
        }
    }

    pub(crate) async fn on_link_state(&mut self, state: LinkState) {
        let Some(next) = PeerStatus::from_link_state(state) else {
            return;
        };
        if self.status.is_terminal() || self.status == next {
            return;
        }

        if next.is_terminal() {
            self.terminate(next);
            return;
        }

        self.set_status(next);
        if next == PeerStatus::Connected
            && let Some(channel) = self.channel.clone()
        {
            self.drain_queue(channel.as_ref()).await;
        }
    }

    /// Adopts the first open channel for sends, flushes the queue through it
    /// and starts the upload worker. Later channels are only read from.
    /// Returns parked uploads that had to be dropped on the way.
    pub(crate) async fn on_channel_open(
        &mut self,
        channel: Arc<dyn Channel>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Vec<TransferId> {
        if self.status.is_terminal() {
            debug!(peer = %self.id, channel = %channel.id(), "ignoring channel on ended session");
            return Vec::new();
        }

        self.receivers.entry(channel.id()).or_default();
        if self.channel_open() {
            debug!(peer = %self.id, channel = %channel.id(), "extra channel, receiving only");
            return Vec::new();
        }

        info!(peer = %self.id, channel = %channel.id(), label = %channel.label(), "channel ready");
        self.channel = Some(channel.clone());
        self.drain_queue(channel.as_ref()).await;

        let uploads = spawn_upload_worker(
            self.id.clone(),
            channel,
            self.flow,
            self.alive.subscribe(),
            events,
        );
        self.uploads = Some(uploads);
        self.pending_uploads
            .take_batch()
            .into_iter()
            .filter_map(|job| self.submit_upload(job))
            .collect()
    }

    /// Returns the incoming transfers lost with the channel.
    pub(crate) fn on_channel_closed(&mut self, channel_id: ChannelId) -> Vec<IncomingTransfer> {
        let lost = self
            .receivers
            .remove(&channel_id)
            .map(|mut receiver| receiver.discard_all())
            .unwrap_or_default();

        if self.channel.as_ref().is_some_and(|c| c.id() == channel_id) {
            info!(peer = %self.id, channel = %channel_id, "channel closed");
            self.channel = None;
            self.uploads = None;
        }
        lost
    }

    async fn drain_queue(&mut self, channel: &dyn Channel) {
        let batch = self.outgoing.take_batch();
        if batch.is_empty() {
            return;
        }
        debug!(peer = %self.id, count = batch.len(), "draining queue");

        let mut pending = batch.into_iter();
        while let Some(payload) = pending.next() {
            if let Err(e) = channel.send_text(payload.clone()).await {
                warn!(peer = %self.id, error = %e, "drain interrupted, requeueing");
                let mut rest = vec![payload];
                rest.extend(pending);
                self.outgoing.requeue_front(rest);
                return;
            }
        }
    }

    /// Sends directly when the channel is writable and nothing is queued
    /// ahead, otherwise queues. An ended session only queues.
    pub(crate) async fn send_text(&mut self, payload: String) {
        if !self.status.is_terminal()
            && self.outgoing.is_empty()
            && let Some(channel) = self.channel.clone().filter(|c| c.is_open())
        {
            match channel.send_text(payload.clone()).await {
                Ok(()) => return,
                Err(e) => warn!(peer = %self.id, error = %e, "send failed, queueing"),
            }
        }

        match self.outgoing.enqueue(payload) {
            Ok(Enqueued::Queued) => debug!(peer = %self.id, queued = self.outgoing.len(), "queued"),
            Ok(Enqueued::Evicted(_)) => warn!(peer = %self.id, "queue full, dropped oldest message"),
            Ok(Enqueued::Discarded(_)) => warn!(peer = %self.id, "queue full, dropped message"),
            Err(e) => warn!(peer = %self.id, error = %e, "message dropped"),
        }
    }

    /// Hands `job` to the upload worker, or parks it until a channel opens.
    /// Returns the transfer that had to be dropped, if any.
    pub(crate) fn submit_upload(&mut self, job: UploadJob) -> Option<TransferId> {
        let job = match self.uploads.as_ref() {
            Some(uploads) => match uploads.send(job) {
                Ok(()) => return None,
                Err(mpsc::error::SendError(job)) => {
                    self.uploads = None;
                    job
                }
            },
            None => job,
        };

        let transfer_id = job.transfer_id;
        match self.pending_uploads.enqueue(job) {
            Ok(Enqueued::Queued) => None,
            Ok(Enqueued::Evicted(old)) => Some(old.transfer_id),
            Ok(Enqueued::Discarded(_)) | Err(_) => Some(transfer_id),
        }
    }

    /// Empties the chat queue and the parked uploads.
    pub(crate) fn take_pending(&mut self) -> PendingSends {
        PendingSends {
            texts: self.outgoing.take_batch(),
            uploads: self.pending_uploads.take_batch(),
        }
    }

    /// Puts sends inherited from a previous session ahead of anything
    /// queued here.
    pub(crate) fn restore_pending(&mut self, pending: PendingSends) {
        self.outgoing.requeue_front(pending.texts);
        self.pending_uploads.requeue_front(pending.uploads);
    }

    /// Receive path of one channel message.
    pub(crate) fn on_channel_message(
        &mut self,
        channel_id: ChannelId,
        payload: ChannelPayload,
    ) -> Result<Inbound, ProtocolError> {
        match payload {
            ChannelPayload::Text(text) => {
                let message =
                    ChannelMessage::parse(&text).map_err(|e| ProtocolError::MalformedPayload {
                        peer: self.id.clone(),
                        reason: e.to_string(),
                    })?;

                match message {
                    ChannelMessage::Chat(chat) => Ok(Inbound::Chat(chat)),
                    ChannelMessage::FileMetadata(mut meta) => {
                        if meta.sender.is_empty() {
                            meta.sender = self.id.to_string();
                        }
                        let receiver = self.receivers.entry(channel_id).or_default();
                        match receiver.register(&meta, self.id.as_str())? {
                            Registered::Pending => Ok(Inbound::FileAnnounced(meta)),
                            Registered::Completed(file) => Ok(Inbound::FileCompleted(file)),
                        }
                    }
                }
            }
            ChannelPayload::Binary(chunk) => {
                let Some(receiver) = self.receivers.get_mut(&channel_id) else {
                    return Err(ProtocolError::UnattributedChunk {
                        peer: self.id.clone(),
                    });
                };
                match receiver.accept_chunk(&self.id, chunk)? {
                    ChunkOutcome::Progress {
                        transfer_id,
                        progress,
                        bytes_received,
                    } => Ok(Inbound::FileProgress {
                        transfer_id,
                        progress,
                        bytes_received,
                    }),
                    ChunkOutcome::Completed(file) => Ok(Inbound::FileCompleted(file)),
                }
            }
        }
    }

    /// Drops every unfinished incoming transfer, returning them for
    /// reporting.
    pub(crate) fn take_incoming(&mut self) -> Vec<IncomingTransfer> {
        self.receivers
            .values_mut()
            .flat_map(ChannelReceiver::discard_all)
            .collect()
    }

    /// Tears the session down: stops uploads, closes the link and returns
    /// the incoming transfers that will never complete.
    pub(crate) async fn close(&mut self) -> Vec<IncomingTransfer> {
        self.alive.send_replace(false);
        self.uploads = None;
        self.channel = None;
        if let Some(link) = self.link.take() {
            // Closing waits on the link's callbacks, and those feed the
            // manager's event queue, so it must not run on the manager task.
            let peer = self.id.clone();
            tokio::spawn(async move {
                if let Err(e) = link.close().await {
                    debug!(peer = %peer, error = %e, "link close failed");
                }
            });
        }
        self.take_incoming()
    }

    async fn signal(&self, relay: &mut RelayOutbox, envelope: ClientEnvelope) {
        if let Err(e) = relay.send(&envelope).await {
            warn!(peer = %self.id, kind = envelope.kind(), error = %e, "signal dropped");
        }
    }

    fn set_status(&mut self, status: PeerStatus) {
        debug!(peer = %self.id, from = %self.status, to = %status, "status change");
        self.status = status;
    }

    fn fail(&mut self, action: &str, e: TransportError) {
        error!(peer = %self.id, error = %e, "failed to {action}");
        self.terminate(PeerStatus::Failed);
    }

    fn terminate(&mut self, status: PeerStatus) {
        info!(peer = %self.id, status = %status, "peer session ended");
        self.status = status;
        self.alive.send_replace(false);
        self.uploads = None;
    }
}
