use roomlink_core::ClientEnvelope;
use roomlink_session::{LinkState, PeerStatus, SessionConfig};

use crate::integration::{peer, wait_for_status};
use crate::utils::{LinkCall, init_tracing, start_session};

#[tokio::test]
async fn test_reappearing_peer_gets_a_new_session() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    let old_link = session.new_peer("p1").await;

    old_link.set_state(LinkState::Failed).await;
    wait_for_status(&session, "p1", PeerStatus::Failed).await;

    session
        .relay_message(r#"{"type":"new-peer","id":"p1"}"#)
        .await;
    session
        .next_envelope(|e| matches!(e, ClientEnvelope::Offer { to, .. } if *to == peer("p1")))
        .await;
    let new_link = session.transport.link(&peer("p1")).expect("No link for p1");

    assert_ne!(old_link.tag.link_id, new_link.tag.link_id);
    old_link.wait_for_call(|c| *c == LinkCall::Close).await;
    wait_for_status(&session, "p1", PeerStatus::Connecting).await;

    // Events from the torn-down link must not touch the new session.
    old_link.open_channel().await;
    old_link.set_state(LinkState::Disconnected).await;
    new_link.set_state(LinkState::Connected).await;
    wait_for_status(&session, "p1", PeerStatus::Connected).await;

    let snapshot = session.handle.snapshot();
    let p1 = snapshot.peer(&peer("p1")).expect("p1 missing");
    assert!(!p1.channel_open);
    assert_eq!(p1.status, PeerStatus::Connected);
}

#[tokio::test]
async fn test_replacement_session_inherits_queued_messages() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    let old_link = session.new_peer("p1").await;

    old_link.set_state(LinkState::Failed).await;
    wait_for_status(&session, "p1", PeerStatus::Failed).await;
    session
        .handle
        .broadcast_text("for whoever comes back")
        .await
        .expect("Failed to broadcast");
    session
        .wait_for_snapshot(|s| s.peer(&peer("p1")).is_some_and(|p| p.queued == 1))
        .await;

    session
        .relay_message(r#"{"type":"offer","from":"p1","sdp":{"type":"offer","sdp":"again"}}"#)
        .await;
    session
        .next_envelope(|e| matches!(e, ClientEnvelope::Answer { to, .. } if *to == peer("p1")))
        .await;
    let new_link = session.transport.link(&peer("p1")).expect("No link for p1");
    assert_ne!(old_link.tag.link_id, new_link.tag.link_id);

    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.peer(&peer("p1")).map(|p| p.queued), Some(1));

    let channel = new_link.open_channel().await;
    let texts = {
        channel.wait_for_sent(1).await;
        channel.sent_texts().await
    };
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("for whoever comes back"));
}
