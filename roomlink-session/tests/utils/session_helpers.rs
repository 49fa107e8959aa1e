use std::sync::Arc;
use std::time::Duration;

use roomlink_core::{ClientEnvelope, PeerId};
use roomlink_session::{
    RelayEvent, SessionConfig, SessionEvent, SessionHandle, SessionManager, SessionSnapshot,
};
use tokio::sync::mpsc;
use tracing::Level;

use super::mock_relay::MockRelaySink;
use super::mock_transport::{MockChannel, MockLink, MockTransport};

/// Timeout for anything the session is expected to do (ms).
pub const EVENT_TIMEOUT_MS: u64 = 2000;

/// How long to watch for something that must not happen (ms).
pub const QUIET_PERIOD_MS: u64 = 150;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Config with small chunks so transfers stay cheap in tests.
pub fn small_chunk_config(chunk_size: usize) -> SessionConfig {
    SessionConfig {
        chunk_size,
        ..SessionConfig::default()
    }
}

/// A running session manager wired to mocks.
pub struct TestSession {
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub relay_tx: mpsc::Sender<RelayEvent>,
    pub relay: MockRelaySink,
    pub envelopes: mpsc::UnboundedReceiver<ClientEnvelope>,
    pub transport: Arc<MockTransport>,
}

/// Starts a session whose relay is already open.
pub async fn start_session(config: SessionConfig) -> TestSession {
    let session = start_session_with_closed_relay(config);
    session
        .relay_tx
        .send(RelayEvent::Opened)
        .await
        .expect("relay event channel closed");
    session
        .wait_for_snapshot(|s| s.relay_open)
        .await;
    session
}

pub fn start_session_with_closed_relay(config: SessionConfig) -> TestSession {
    let transport = MockTransport::new();
    let (relay, envelopes) = MockRelaySink::new();
    let (relay_tx, relay_rx) = mpsc::channel(64);

    let (manager, handle, events) =
        SessionManager::new(config, transport.clone(), Arc::new(relay.clone()), relay_rx);
    tokio::spawn(manager.run());

    TestSession {
        handle,
        events,
        relay_tx,
        relay,
        envelopes,
        transport,
    }
}

impl TestSession {
    pub async fn relay_message(&self, json: impl Into<String>) {
        self.relay_tx
            .send(RelayEvent::Message(json.into()))
            .await
            .expect("relay event channel closed");
    }

    /// Announces `id` through the relay and waits for the offer to it.
    pub async fn new_peer(&mut self, id: &str) -> Arc<MockLink> {
        let peer = PeerId::from(id);
        self.relay_message(format!(r#"{{"type":"new-peer","id":"{id}"}}"#))
            .await;
        self.next_envelope(|e| matches!(e, ClientEnvelope::Offer { to, .. } if *to == peer))
            .await;
        self.transport
            .link(&peer)
            .expect("no link created for new peer")
    }

    /// `new_peer` plus an open channel the session has adopted.
    pub async fn connected_peer(&mut self, id: &str) -> (Arc<MockLink>, Arc<MockChannel>) {
        let link = self.new_peer(id).await;
        let channel = link.open_channel().await;
        let peer = PeerId::from(id);
        self.wait_for_snapshot(|s| s.peer(&peer).is_some_and(|p| p.channel_open))
            .await;
        (link, channel)
    }

    pub async fn next_event<F>(&mut self, pred: F) -> SessionEvent
    where
        F: Fn(&SessionEvent) -> bool,
    {
        let deadline = Duration::from_millis(EVENT_TIMEOUT_MS);
        tokio::time::timeout(deadline, async {
            loop {
                match self.events.recv().await {
                    Some(event) if pred(&event) => return event,
                    Some(_) => continue,
                    None => panic!("session event stream ended"),
                }
            }
        })
        .await
        .expect("timed out waiting for session event")
    }

    /// Collects events until `stop` matches, returning all of them.
    pub async fn events_until<F>(&mut self, stop: F) -> Vec<SessionEvent>
    where
        F: Fn(&SessionEvent) -> bool,
    {
        let deadline = Duration::from_millis(EVENT_TIMEOUT_MS);
        tokio::time::timeout(deadline, async {
            let mut seen = Vec::new();
            loop {
                let Some(event) = self.events.recv().await else {
                    panic!("session event stream ended");
                };
                let done = stop(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
        })
        .await
        .expect("timed out collecting session events")
    }

    /// Asserts no matching event shows up within the quiet period.
    pub async fn expect_no_event<F>(&mut self, pred: F)
    where
        F: Fn(&SessionEvent) -> bool,
    {
        let quiet = Duration::from_millis(QUIET_PERIOD_MS);
        let _ = tokio::time::timeout(quiet, async {
            while let Some(event) = self.events.recv().await {
                assert!(!pred(&event), "unexpected session event: {event:?}");
            }
        })
        .await;
    }

    pub async fn next_envelope<F>(&mut self, pred: F) -> ClientEnvelope
    where
        F: Fn(&ClientEnvelope) -> bool,
    {
        let deadline = Duration::from_millis(EVENT_TIMEOUT_MS);
        tokio::time::timeout(deadline, async {
            loop {
                match self.envelopes.recv().await {
                    Some(envelope) if pred(&envelope) => return envelope,
                    Some(_) => continue,
                    None => panic!("relay sink dropped"),
                }
            }
        })
        .await
        .expect("timed out waiting for relay envelope")
    }

    pub async fn wait_for_snapshot<F>(&self, pred: F) -> Arc<SessionSnapshot>
    where
        F: Fn(&SessionSnapshot) -> bool,
    {
        let mut rx = self.handle.subscribe();
        let deadline = Duration::from_millis(EVENT_TIMEOUT_MS);
        tokio::time::timeout(deadline, async {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                if pred(&snapshot) {
                    return snapshot;
                }
                rx.changed().await.expect("session manager stopped");
            }
        })
        .await
        .expect("timed out waiting for snapshot")
    }
}
