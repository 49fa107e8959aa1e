use std::time::Duration;

use roomlink_core::{ClientEnvelope, RoomIdentity};
use roomlink_session::{RelayEvent, SessionConfig, SessionEvent};

use crate::utils::{init_tracing, start_session, start_session_with_closed_relay};

#[tokio::test]
async fn test_join_room_sets_identity_after_confirmation() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;

    session
        .handle
        .join_room("ABCD")
        .await
        .expect("Failed to send join command");

    let envelope = session
        .next_envelope(|e| matches!(e, ClientEnvelope::Join { .. }))
        .await;
    assert_eq!(
        envelope,
        ClientEnvelope::Join {
            room: "ABCD".to_owned()
        }
    );
    assert!(
        session.handle.snapshot().room.is_none(),
        "Room identity must wait for the relay's confirmation"
    );

    session
        .relay_message(r#"{"type":"room-joined","room":"ABCD","name":"Fox"}"#)
        .await;

    let event = session
        .next_event(|e| matches!(e, SessionEvent::RoomJoined(_)))
        .await;
    assert_eq!(
        event,
        SessionEvent::RoomJoined(RoomIdentity::new("ABCD", "Fox"))
    );

    let snapshot = session.wait_for_snapshot(|s| s.room.is_some()).await;
    assert_eq!(snapshot.room, Some(RoomIdentity::new("ABCD", "Fox")));
}

#[tokio::test]
async fn test_room_assigned_sets_identity() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    session
        .relay_message(r#"{"type":"room-assigned","room":"QRST","name":"Otter"}"#)
        .await;

    let event = session
        .next_event(|e| matches!(e, SessionEvent::RoomJoined(_)))
        .await;
    assert_eq!(
        event,
        SessionEvent::RoomJoined(RoomIdentity::new("QRST", "Otter"))
    );
}

#[tokio::test]
async fn test_join_while_relay_closed_is_flushed_once_on_open() {
    init_tracing();

    let mut session = start_session_with_closed_relay(SessionConfig::default());

    session
        .handle
        .join_room("WXYZ")
        .await
        .expect("Failed to send join command");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        session.relay.sent().await.is_empty(),
        "Nothing may reach a closed relay"
    );

    session.relay_tx.send(RelayEvent::Opened).await.unwrap();
    let envelope = session
        .next_envelope(|e| matches!(e, ClientEnvelope::Join { .. }))
        .await;
    assert_eq!(
        envelope,
        ClientEnvelope::Join {
            room: "WXYZ".to_owned()
        }
    );

    // A reconnect must not replay what was already flushed.
    session.relay_tx.send(RelayEvent::Closed).await.unwrap();
    session.wait_for_snapshot(|s| !s.relay_open).await;
    session.relay_tx.send(RelayEvent::Opened).await.unwrap();
    session.wait_for_snapshot(|s| s.relay_open).await;

    assert_eq!(session.relay.sent().await.len(), 1);
}
