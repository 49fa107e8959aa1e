use bytes::Bytes;
use roomlink_core::TransferId;
use roomlink_core::utils::CHUNK_SIZE;
use roomlink_session::{ConversationEntry, FileState, SessionConfig, SessionEvent};

use crate::integration::{metadata_json, peer};
use crate::utils::{init_tracing, start_session};

#[tokio::test]
async fn test_peer_left_mid_transfer_discards_it() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    let (link1, channel1) = session.connected_peer("p1").await;
    let (link2, channel2) = session.connected_peer("p2").await;

    let transfer_id = TransferId::new();
    let size = 4 * CHUNK_SIZE as u64;
    link1
        .deliver_text(&channel1, metadata_json(transfer_id, "big.bin", size))
        .await;
    link1
        .deliver_binary(&channel1, Bytes::from(vec![0u8; CHUNK_SIZE]))
        .await;

    let progress = session
        .next_event(|e| matches!(e, SessionEvent::IncomingFileProgress { .. }))
        .await;
    assert!(matches!(
        progress,
        SessionEvent::IncomingFileProgress { progress: 25, .. }
    ));

    session
        .relay_message(r#"{"type":"peer-left","id":"p1"}"#)
        .await;

    let events = session
        .events_until(|e| matches!(e, SessionEvent::PeerRemoved { .. }))
        .await;
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::IncomingFileFailed { peer: from, transfer_id: id, .. }
            if *from == peer("p1") && *id == transfer_id
    )));

    // The rest of the bytes showing up on another peer's channel belong to
    // nothing there.
    link2
        .deliver_binary(&channel2, Bytes::from(vec![0u8; 3 * CHUNK_SIZE]))
        .await;
    session
        .expect_no_event(|e| {
            matches!(
                e,
                SessionEvent::IncomingFileProgress { .. }
                    | SessionEvent::IncomingFileCompleted { .. }
            )
        })
        .await;

    let snapshot = session.handle.snapshot();
    assert!(snapshot.peer(&peer("p1")).is_none());
    let ConversationEntry::File(entry) = &snapshot.conversation[0] else {
        panic!("expected a file entry");
    };
    assert_eq!(entry.state, FileState::Failed);
    assert_eq!(entry.progress, 25);
}

#[tokio::test]
async fn test_same_transfer_id_from_two_peers_stays_separate() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    let (link1, channel1) = session.connected_peer("p1").await;
    let (link2, channel2) = session.connected_peer("p2").await;

    let transfer_id = TransferId::new();
    link1
        .deliver_text(&channel1, metadata_json(transfer_id, "a.bin", 4))
        .await;
    link2
        .deliver_text(&channel2, metadata_json(transfer_id, "b.bin", 6))
        .await;

    link2
        .deliver_binary(&channel2, Bytes::from_static(b"bbbbbb"))
        .await;
    link1
        .deliver_binary(&channel1, Bytes::from_static(b"aaaa"))
        .await;

    let first = session
        .next_event(|e| matches!(e, SessionEvent::IncomingFileCompleted { .. }))
        .await;
    let second = session
        .next_event(|e| matches!(e, SessionEvent::IncomingFileCompleted { .. }))
        .await;

    let SessionEvent::IncomingFileCompleted { peer: from, file } = first else {
        unreachable!();
    };
    assert_eq!(from, peer("p2"));
    assert_eq!(file.data, Bytes::from_static(b"bbbbbb"));

    let SessionEvent::IncomingFileCompleted { peer: from, file } = second else {
        unreachable!();
    };
    assert_eq!(from, peer("p1"));
    assert_eq!(file.data, Bytes::from_static(b"aaaa"));
}
