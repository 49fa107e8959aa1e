use roomlink_core::{ClientEnvelope, IceCandidate, SdpKind};
use roomlink_session::{LinkState, PeerStatus, SessionConfig, SessionEvent};

use crate::integration::{peer, wait_for_status};
use crate::utils::{LinkCall, init_tracing, start_session};

#[tokio::test]
async fn test_new_peer_creates_pending_session_then_offers() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    session
        .relay_message(r#"{"type":"new-peer","id":"p1"}"#)
        .await;

    let envelope = session
        .next_envelope(|e| matches!(e, ClientEnvelope::Offer { .. }))
        .await;
    let ClientEnvelope::Offer { to, sdp } = envelope else {
        unreachable!();
    };
    assert_eq!(to, peer("p1"));
    assert_eq!(sdp.kind, SdpKind::Offer);

    let events = session
        .events_until(|e| {
            matches!(
                e,
                SessionEvent::PeerStatusChanged {
                    status: PeerStatus::Connecting,
                    ..
                }
            )
        })
        .await;
    let statuses: Vec<_> = events
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::PeerStatusChanged { peer, status } => Some((peer, status)),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            (peer("p1"), PeerStatus::Pending),
            (peer("p1"), PeerStatus::Connecting),
        ]
    );

    let link = session.transport.link(&peer("p1")).expect("No link for p1");
    assert_eq!(
        link.calls().await,
        vec![LinkCall::CreateChannel("chat".to_owned()), LinkCall::CreateOffer]
    );
}

#[tokio::test]
async fn test_gathered_candidates_are_relayed() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    let link = session.new_peer("p1").await;

    let candidate = IceCandidate {
        candidate: "candidate:1 1 udp 2122260223 192.168.1.2 54321 typ host".to_owned(),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
        username_fragment: None,
    };
    link.gather_candidate(candidate.clone()).await;

    let envelope = session
        .next_envelope(|e| matches!(e, ClientEnvelope::Candidate { .. }))
        .await;
    assert_eq!(
        envelope,
        ClientEnvelope::Candidate {
            to: peer("p1"),
            candidate,
        }
    );
}

#[tokio::test]
async fn test_repeated_new_peer_for_live_session_is_ignored() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    session.new_peer("p1").await;
    session
        .relay_message(r#"{"type":"new-peer","id":"p1"}"#)
        .await;
    session.new_peer("p2").await;

    assert_eq!(session.transport.links_created(), 2);
}

#[tokio::test]
async fn test_link_state_maps_onto_peer_status() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    let link = session.new_peer("p1").await;

    link.set_state(LinkState::Connected).await;
    wait_for_status(&session, "p1", PeerStatus::Connected).await;

    link.set_state(LinkState::Failed).await;
    session
        .next_event(|e| {
            matches!(
                e,
                SessionEvent::PeerStatusChanged {
                    status: PeerStatus::Failed,
                    ..
                }
            )
        })
        .await;

    // Terminal: a late "connected" does not revive the session.
    link.set_state(LinkState::Connected).await;
    link.set_state(LinkState::Disconnected).await;
    session
        .expect_no_event(|e| matches!(e, SessionEvent::PeerStatusChanged { .. }))
        .await;
    assert_eq!(
        session.handle.snapshot().peer(&peer("p1")).map(|p| p.status),
        Some(PeerStatus::Failed)
    );
}
