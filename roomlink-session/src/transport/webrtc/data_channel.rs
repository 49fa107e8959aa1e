use crate::error::TransportError;
use crate::transport::{Channel, ChannelId, ChannelPayload, LinkTag, TransportEvent};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;

/// `RTCDataChannel` behind the `Channel` seam.
pub struct WebRtcChannel {
    id: ChannelId,
    data_channel: Arc<RTCDataChannel>,
    drained: Arc<Notify>,
}

impl WebRtcChannel {
    /// Registers open/message/close/drain callbacks on `data_channel` and
    /// forwards them into `events`. Used for both eager and incoming channels.
    pub(crate) async fn wire(
        tag: LinkTag,
        data_channel: Arc<RTCDataChannel>,
        events: mpsc::Sender<TransportEvent>,
        low_threshold: usize,
    ) {
        let channel = Arc::new(Self {
            id: ChannelId::next(),
            data_channel: data_channel.clone(),
            drained: Arc::new(Notify::new()),
        });
        debug!(
            peer = %tag.peer_id,
            channel = %channel.id,
            label = data_channel.label(),
            "wiring data channel"
        );

        let open_tx = events.clone();
        let open_tag = tag.clone();
        let open_channel = channel.clone();
        data_channel.on_open(Box::new(move || {
            Box::pin(async move {
                info!(peer = %open_tag.peer_id, channel = %open_channel.id, "data channel open");
                let _ = open_tx
                    .send(TransportEvent::ChannelOpen(open_tag, open_channel))
                    .await;
            })
        }));

        let msg_tx = events.clone();
        let msg_tag = tag.clone();
        let channel_id = channel.id;
        data_channel.on_message(Box::new(move |msg: DataChannelMessage| {
            let tx = msg_tx.clone();
            let tag = msg_tag.clone();
            Box::pin(async move {
                let payload = if msg.is_string {
                    ChannelPayload::Text(String::from_utf8_lossy(&msg.data).into_owned())
                } else {
                    ChannelPayload::Binary(msg.data)
                };
                let _ = tx
                    .send(TransportEvent::Message(tag, channel_id, payload))
                    .await;
            })
        }));

        let close_tx = events;
        let close_tag = tag;
        data_channel.on_close(Box::new(move || {
            let tx = close_tx.clone();
            let tag = close_tag.clone();
            Box::pin(async move {
                let _ = tx
                    .send(TransportEvent::ChannelClosed(tag, channel_id))
                    .await;
            })
        }));

        data_channel
            .set_buffered_amount_low_threshold(low_threshold)
            .await;
        let drained = channel.drained.clone();
        data_channel
            .on_buffered_amount_low(Box::new(move || {
                let drained = drained.clone();
                Box::pin(async move {
                    drained.notify_waiters();
                })
            }))
            .await;
    }
}

#[async_trait]
impl Channel for WebRtcChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn label(&self) -> String {
        self.data_channel.label().to_owned()
    }

    fn is_open(&self) -> bool {
        self.data_channel.ready_state() == RTCDataChannelState::Open
    }

    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ChannelClosed);
        }
        self.data_channel
            .send_text(text)
            .await
            .map_err(|e| TransportError::Backend(e.into()))?;
        Ok(())
    }

    async fn send_binary(&self, data: Bytes) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ChannelClosed);
        }
        self.data_channel
            .send(&data)
            .await
            .map_err(|e| TransportError::Backend(e.into()))?;
        Ok(())
    }

    async fn buffered_amount(&self) -> usize {
        self.data_channel.buffered_amount().await
    }

    async fn buffered_amount_low(&self) {
        self.drained.notified().await
    }
}
