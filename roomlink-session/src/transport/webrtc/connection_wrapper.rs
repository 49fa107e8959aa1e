use crate::error::TransportError;
use crate::transport::webrtc::convert::{
    from_rtc_candidate, from_rtc_description, to_rtc_candidate, to_rtc_description,
};
use crate::transport::webrtc::data_channel::WebRtcChannel;
use crate::transport::{Link, LinkState, LinkTag, Transport, TransportConfig, TransportEvent};
use anyhow::Context;
use async_trait::async_trait;
use roomlink_core::{IceCandidate, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Builds webrtc-rs peer connections for the session manager.
pub struct WebRtcTransport {
    api: API,
    config: TransportConfig,
}

impl WebRtcTransport {
    pub fn new(config: TransportConfig) -> anyhow::Result<Self> {
        // Codecs are registered even though only data channels are used.
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, config })
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transport for WebRtcTransport {
    async fn create_link(
        &self,
        tag: LinkTag,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn Link>, TransportError> {
        let peer_connection = Arc::new(
            self.api
                .new_peer_connection(self.rtc_configuration())
                .await
                .context("failed to create peer connection")?,
        );

        let state_tx = events.clone();
        let state_tag = tag.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let tag = state_tag.clone();

                Box::pin(async move {
                    info!(peer = %tag.peer_id, state = ?s, "peer connection state changed");
                    let state = match s {
                        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => {
                            LinkState::New
                        }
                        RTCPeerConnectionState::Connecting => LinkState::Connecting,
                        RTCPeerConnectionState::Connected => LinkState::Connected,
                        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                        RTCPeerConnectionState::Failed => LinkState::Failed,
                        RTCPeerConnectionState::Closed => LinkState::Closed,
                    };
                    let _ = tx.send(TransportEvent::StateChanged(tag, state)).await;
                })
            },
        ));

        // Trickle ICE: every gathered candidate goes out through the relay.
        let ice_tx = events.clone();
        let ice_tag = tag.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let tag = ice_tag.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(
                        tag,
                        from_rtc_candidate(init),
                    ))
                    .await;
            })
        }));

        // Channels opened by the remote side.
        let dc_tx = events.clone();
        let dc_tag = tag.clone();
        let low_threshold = self.config.buffered_low_threshold;
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let tag = dc_tag.clone();

            Box::pin(async move {
                debug!(peer = %tag.peer_id, label = dc.label(), "incoming data channel");
                WebRtcChannel::wire(tag, dc, tx, low_threshold).await;
            })
        }));

        Ok(Arc::new(WebRtcLink {
            tag,
            peer_connection,
            events,
            low_threshold,
        }))
    }
}

pub struct WebRtcLink {
    tag: LinkTag,
    peer_connection: Arc<RTCPeerConnection>,
    events: mpsc::Sender<TransportEvent>,
    low_threshold: usize,
}

#[async_trait]
impl Link for WebRtcLink {
    async fn create_channel(&self, label: &str) -> Result<(), TransportError> {
        let dc = self
            .peer_connection
            .create_data_channel(
                label,
                Some(RTCDataChannelInit {
                    ordered: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .context("failed to create data channel")?;

        WebRtcChannel::wire(self.tag.clone(), dc, self.events.clone(), self.low_threshold).await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("failed to create offer")?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("failed to set local offer")?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("failed to create answer")?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("failed to set local answer")?;
        from_rtc_description(answer)
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        let desc = to_rtc_description(desc)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("failed to set remote description")?;
        Ok(())
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.peer_connection
            .add_ice_candidate(to_rtc_candidate(candidate))
            .await
            .context("failed to add ICE candidate")?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.peer_connection
            .close()
            .await
            .context("failed to close peer connection")?;
        Ok(())
    }
}
