use crate::config::SessionConfig;
use crate::error::ProtocolError;
use crate::peer::{Inbound, PeerSession, PeerStatus, PendingSends, UploadJob};
use crate::relay::{RelayEvent, RelayOutbox, RelaySink};
use crate::session::{
    Conversation, SessionCommand, SessionEvent, SessionHandle, SessionSnapshot,
};
use crate::transfer::{IncomingTransfer, OutgoingFile};
use crate::transport::{ChannelId, ChannelPayload, Transport, TransportEvent};
use roomlink_core::{
    ChannelMessage, ChatMessage, ClientEnvelope, PeerId, RelayEnvelope, RoomIdentity, TransferId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Single owner of the room state and of every peer session.
///
/// Relay events, transport events and commands are processed one at a time
/// on the task running [`SessionManager::run`]. Readers get immutable
/// snapshots through the handle.
pub struct SessionManager {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    relay: RelayOutbox,
    relay_rx: mpsc::Receiver<RelayEvent>,
    command_rx: mpsc::Receiver<SessionCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport_tx: mpsc::Sender<TransportEvent>,
    peers: HashMap<PeerId, PeerSession>,
    room: Option<RoomIdentity>,
    conversation: Conversation,
    next_link_id: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshot: watch::Sender<Arc<SessionSnapshot>>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        relay_sink: Arc<dyn RelaySink>,
        relay_rx: mpsc::Receiver<RelayEvent>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (events, events_rx) = mpsc::unbounded_channel();
        let (snapshot, snapshot_rx) = watch::channel(Arc::new(SessionSnapshot::default()));

        let relay = RelayOutbox::new(
            relay_sink,
            config.relay_queue_capacity,
            config.overflow_policy,
        );

        let manager = Self {
            config,
            transport,
            relay,
            relay_rx,
            command_rx,
            transport_rx,
            transport_tx,
            peers: HashMap::new(),
            room: None,
            conversation: Conversation::default(),
            next_link_id: 0,
            events,
            snapshot,
        };

        (manager, SessionHandle::new(command_tx, snapshot_rx), events_rx)
    }

    /// Event loop. Runs until `Shutdown` arrives or every handle is dropped.
    pub async fn run(mut self) {
        info!("session manager started");
        let mut relay_live = true;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(c) => self.on_command(c).await,
                    }
                }

                evt = self.relay_rx.recv(), if relay_live => {
                    match evt {
                        Some(e) => self.on_relay_event(e).await,
                        None => {
                            warn!("relay event stream ended");
                            relay_live = false;
                            self.on_relay_event(RelayEvent::Closed).await;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    // The manager holds a sender, so this never yields `None`.
                    if let Some(e) = evt {
                        self.on_transport_event(e).await;
                    }
                }
            }
        }

        self.on_command(SessionCommand::Shutdown).await;
        info!("session manager stopped");
    }

    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub async fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::JoinRoom { code } => {
                info!(room = %code, "joining room");
                if let Err(e) = self.relay.send(&ClientEnvelope::Join { room: code }).await {
                    warn!(error = %e, "join request dropped");
                }
            }

            SessionCommand::BroadcastText { text } => self.broadcast_text(text).await,

            SessionCommand::BroadcastFile { file } => self.broadcast_file(file),

            SessionCommand::Shutdown => {
                let peers: Vec<_> = self.peers.drain().collect();
                for (id, mut peer) in peers {
                    let pending = peer.take_pending();
                    let lost = peer.close().await;
                    self.report_unsent(&id, pending);
                    self.report_lost(&id, lost);
                }
                info!("all peer sessions closed");
            }
        }
        self.publish();
    }

    pub async fn on_relay_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Opened => {
                info!("relay connected");
                self.relay.on_opened().await;
            }
            RelayEvent::Message(text) => match RelayEnvelope::parse(&text) {
                Ok(envelope) => self.on_relay_envelope(envelope).await,
                Err(e) => warn!(error = %e, "ignoring malformed relay envelope"),
            },
            RelayEvent::Closed => {
                warn!(queued = self.relay.queued(), "relay disconnected");
                self.relay.on_closed();
            }
        }
        self.publish();
    }

    pub async fn on_relay_envelope(&mut self, envelope: RelayEnvelope) {
        debug!(kind = envelope.kind(), "relay envelope");
        match envelope {
            RelayEnvelope::RoomAssigned { room, name } | RelayEnvelope::RoomJoined { room, name } => {
                let identity = RoomIdentity::new(room, name);
                info!(room = %identity.room_code, name = %identity.local_name, "joined room");
                self.room = Some(identity.clone());
                self.emit(SessionEvent::RoomJoined(identity));
            }

            RelayEnvelope::NewPeer { id } => {
                if self.live_status(&id).is_some() {
                    debug!(peer = %id, "new-peer for a live session, ignoring");
                } else {
                    let before = self.ensure_peer(&id).await;
                    if let Some(peer) = self.peers.get_mut(&id) {
                        peer.start_call(&mut self.relay).await;
                    }
                    self.after_peer_change(&id, before);
                }
            }

            RelayEnvelope::Offer { from, sdp } => {
                let before = self.ensure_peer(&from).await;
                if let Some(peer) = self.peers.get_mut(&from) {
                    peer.accept_offer(sdp, &mut self.relay).await;
                }
                self.after_peer_change(&from, before);
            }

            RelayEnvelope::Answer { from, sdp } => {
                let Some(peer) = self.peers.get_mut(&from).filter(|p| !p.is_terminal()) else {
                    let violation = ProtocolError::SignalingOrderViolation {
                        peer: from,
                        kind: "answer",
                    };
                    warn!(error = %violation, "dropping answer");
                    return;
                };
                let before = peer.status();
                peer.accept_answer(sdp).await;
                self.after_peer_change(&from, Some(before));
            }

            RelayEnvelope::Candidate { from, candidate } => {
                // Late candidates for an ended session never replace it.
                if self.peers.get(&from).is_some_and(PeerSession::is_terminal) {
                    let violation = ProtocolError::SignalingOrderViolation {
                        peer: from,
                        kind: "candidate",
                    };
                    warn!(error = %violation, "dropping candidate");
                    return;
                }
                let before = self.ensure_peer(&from).await;
                if let Some(peer) = self.peers.get_mut(&from) {
                    peer.add_candidate(candidate).await;
                }
                self.after_peer_change(&from, before);
            }

            RelayEnvelope::PeerLeft { id } => self.remove_peer(&id).await,

            RelayEnvelope::Unknown => warn!("ignoring relay envelope of unknown type"),
        }
        self.publish();
    }

    pub async fn on_transport_event(&mut self, event: TransportEvent) {
        let tag = event.tag().clone();
        let Some(peer) = self
            .peers
            .get_mut(&tag.peer_id)
            .filter(|p| p.link_id() == tag.link_id)
        else {
            debug!(link = %tag, "dropping event from stale link");
            return;
        };
        let before = peer.status();

        match event {
            TransportEvent::ChannelOpen(_, channel) => {
                let dropped = peer.on_channel_open(channel, self.events.clone()).await;
                self.report_dropped_uploads(&tag.peer_id, dropped);
            }
            TransportEvent::ChannelClosed(_, channel_id) => {
                let lost = peer.on_channel_closed(channel_id);
                self.report_lost(&tag.peer_id, lost);
            }
            TransportEvent::Message(_, channel_id, payload) => {
                if peer.is_terminal() {
                    debug!(peer = %tag.peer_id, "dropping message for ended session");
                } else {
                    self.on_channel_message(&tag.peer_id, channel_id, payload);
                }
            }
            TransportEvent::StateChanged(_, state) => {
                debug!(peer = %tag.peer_id, ?state, "link state");
                peer.on_link_state(state).await;
            }
            TransportEvent::CandidateGenerated(_, candidate) => {
                let envelope = ClientEnvelope::Candidate {
                    to: tag.peer_id.clone(),
                    candidate,
                };
                if let Err(e) = self.relay.send(&envelope).await {
                    warn!(peer = %tag.peer_id, error = %e, "candidate dropped");
                }
            }
        }

        self.after_peer_change(&tag.peer_id, Some(before));
        self.publish();
    }

    fn on_channel_message(&mut self, peer_id: &PeerId, channel_id: ChannelId, payload: ChannelPayload) {
        let Some(peer) = self.peers.get_mut(peer_id) else {
            return;
        };

        match peer.on_channel_message(channel_id, payload) {
            Ok(Inbound::Chat(message)) => {
                debug!(peer = %peer_id, sender = %message.sender, "chat received");
                self.conversation
                    .push_chat(Some(peer_id.clone()), message.clone());
                self.emit(SessionEvent::ChatReceived {
                    peer: peer_id.clone(),
                    message,
                });
            }
            Ok(Inbound::FileAnnounced(meta)) => {
                info!(
                    peer = %peer_id,
                    transfer = %meta.transfer_id,
                    file = %meta.filename,
                    size = meta.size,
                    "incoming file"
                );
                self.conversation.file_started(peer_id, &meta);
                self.emit(SessionEvent::IncomingFileStarted {
                    peer: peer_id.clone(),
                    transfer_id: meta.transfer_id,
                    sender: meta.sender,
                    filename: meta.filename,
                    mime_type: meta.mime_type,
                    size: meta.size,
                });
            }
            Ok(Inbound::FileProgress {
                transfer_id,
                progress,
                bytes_received,
            }) => {
                self.conversation
                    .file_progress(peer_id, transfer_id, progress);
                self.emit(SessionEvent::IncomingFileProgress {
                    peer: peer_id.clone(),
                    transfer_id,
                    progress,
                    bytes_received,
                });
            }
            Ok(Inbound::FileCompleted(file)) => {
                info!(
                    peer = %peer_id,
                    transfer = %file.transfer_id,
                    bytes = file.data.len(),
                    "file received"
                );
                self.conversation.file_completed(peer_id, &file);
                self.emit(SessionEvent::IncomingFileCompleted {
                    peer: peer_id.clone(),
                    file,
                });
            }
            Err(e) => {
                warn!(peer = %peer_id, error = %e, "dropping channel message");
                if let ProtocolError::TransferOverflow { transfer, .. } = e {
                    self.conversation.file_failed(peer_id, transfer);
                    self.emit(SessionEvent::IncomingFileFailed {
                        peer: peer_id.clone(),
                        transfer_id: transfer,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn broadcast_text(&mut self, text: String) {
        let message = ChatMessage {
            sender: self.local_name(),
            message: text,
        };
        let payload = match ChannelMessage::Chat(message.clone()).to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to encode chat message");
                return;
            }
        };

        for peer in self.peers.values_mut() {
            peer.send_text(payload.clone()).await;
        }
        self.conversation.push_chat(None, message);
    }

    fn broadcast_file(&mut self, file: OutgoingFile) {
        let transfer_id = TransferId::new();
        let sender_name = self.local_name();
        info!(
            transfer = %transfer_id,
            file = %file.name,
            size = file.size,
            peers = self.peers.len(),
            "broadcasting file"
        );
        self.conversation
            .push_local_file(transfer_id, &sender_name, &file);

        let file = Arc::new(file);
        let mut dropped = Vec::new();
        for (id, peer) in self.peers.iter_mut() {
            let job = UploadJob {
                file: file.clone(),
                transfer_id,
                sender_name: sender_name.clone(),
            };
            if let Some(lost) = peer.submit_upload(job) {
                dropped.push((id.clone(), lost));
            }
        }

        for (peer, transfer_id) in dropped {
            self.report_dropped_uploads(&peer, vec![transfer_id]);
        }
    }

    fn report_dropped_uploads(&self, peer: &PeerId, dropped: Vec<TransferId>) {
        for transfer_id in dropped {
            warn!(peer = %peer, transfer = %transfer_id, "upload queue full, file dropped");
            self.emit(SessionEvent::OutgoingFileFailed {
                peer: peer.clone(),
                transfer_id,
                reason: "upload queue full".to_owned(),
            });
        }
    }

    /// Uploads that never reached a channel before the session went away.
    fn report_unsent(&self, peer: &PeerId, pending: PendingSends) {
        if !pending.texts.is_empty() {
            warn!(peer = %peer, count = pending.texts.len(), "queued messages discarded");
        }
        for job in pending.uploads {
            self.emit(SessionEvent::OutgoingFileFailed {
                peer: peer.clone(),
                transfer_id: job.transfer_id,
                reason: "peer session ended".to_owned(),
            });
        }
    }

    /// Status of a session that can still progress, `None` if absent or
    /// ended.
    fn live_status(&self, id: &PeerId) -> Option<PeerStatus> {
        self.peers
            .get(id)
            .map(PeerSession::status)
            .filter(|s| !s.is_terminal())
    }

    /// Status of the live session for `id`, creating one first if there is
    /// none or the existing one has ended.
    async fn ensure_peer(&mut self, id: &PeerId) -> Option<PeerStatus> {
        if let Some(status) = self.live_status(id) {
            return Some(status);
        }
        self.replace_peer(id).await;
        self.after_peer_change(id, None);
        self.peers.get(id).map(PeerSession::status)
    }

    /// Installs a fresh session for `id`, tearing down any previous one.
    /// Sends still queued on the old session move to the new one.
    async fn replace_peer(&mut self, id: &PeerId) {
        let mut carried = None;
        if let Some(mut old) = self.peers.remove(id) {
            info!(peer = %id, old_link = old.link_id(), "replacing ended peer session");
            carried = Some(old.take_pending());
            let lost = old.close().await;
            self.report_lost(id, lost);
        }

        self.next_link_id += 1;
        let mut peer = PeerSession::open(
            id.clone(),
            self.next_link_id,
            self.transport.as_ref(),
            self.transport_tx.clone(),
            &self.config,
        )
        .await;
        if let Some(pending) = carried {
            peer.restore_pending(pending);
        }
        info!(peer = %id, link = peer.link_id(), "peer session created");
        self.peers.insert(id.clone(), peer);
    }

    async fn remove_peer(&mut self, id: &PeerId) {
        let Some(mut peer) = self.peers.remove(id) else {
            debug!(peer = %id, "peer-left for unknown peer");
            return;
        };
        info!(peer = %id, "peer left");
        let pending = peer.take_pending();
        let lost = peer.close().await;
        self.report_unsent(id, pending);
        self.report_lost(id, lost);
        self.emit(SessionEvent::PeerRemoved { peer: id.clone() });
    }

    /// Emits a status change if there was one; a session that just ended
    /// gives up its unfinished incoming transfers.
    fn after_peer_change(&mut self, id: &PeerId, before: Option<PeerStatus>) {
        let Some(peer) = self.peers.get_mut(id) else {
            return;
        };
        let status = peer.status();
        if before == Some(status) {
            return;
        }

        let lost = if status.is_terminal() {
            peer.take_incoming()
        } else {
            Vec::new()
        };
        info!(peer = %id, status = %status, "peer status");
        self.emit(SessionEvent::PeerStatusChanged {
            peer: id.clone(),
            status,
        });
        self.report_lost(id, lost);
    }

    fn report_lost(&mut self, peer: &PeerId, lost: Vec<IncomingTransfer>) {
        for transfer in lost {
            warn!(
                peer = %peer,
                transfer = %transfer.transfer_id,
                progress = transfer.progress(),
                "incoming transfer discarded"
            );
            self.conversation
                .file_failed(peer, transfer.transfer_id);
            self.emit(SessionEvent::IncomingFileFailed {
                peer: peer.clone(),
                transfer_id: transfer.transfer_id,
                reason: "peer session ended".to_owned(),
            });
        }
    }

    fn local_name(&self) -> String {
        self.room
            .as_ref()
            .map(|r| r.local_name.clone())
            .unwrap_or_default()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            room: self.room.clone(),
            relay_open: self.relay.is_open(),
            peers: self
                .peers
                .iter()
                .map(|(id, peer)| (id.clone(), peer.snapshot()))
                .collect(),
            conversation: self.conversation.entries().to_vec(),
        };
        self.snapshot.send_replace(Arc::new(snapshot));
    }
}
