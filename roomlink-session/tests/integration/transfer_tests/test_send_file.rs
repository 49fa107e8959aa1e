use bytes::{Bytes, BytesMut};
use roomlink_core::utils::CHUNK_SIZE;
use roomlink_core::{ChannelMessage, FileMetadata, TransferId};
use roomlink_session::{
    ChannelPayload, FlowControl, OutgoingFile, SessionConfig, SessionEvent, send_file,
};
use tokio::sync::watch;

use crate::integration::peer;
use crate::utils::{MockChannel, init_tracing, small_chunk_config, start_session};

fn patterned(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

fn metadata(payload: &ChannelPayload) -> FileMetadata {
    match payload {
        ChannelPayload::Text(text) => match ChannelMessage::parse(text) {
            Ok(ChannelMessage::FileMetadata(meta)) => meta,
            other => panic!("expected file metadata, got {other:?}"),
        },
        ChannelPayload::Binary(_) => panic!("expected metadata before chunks"),
    }
}

fn chunk_len(payload: &ChannelPayload) -> usize {
    match payload {
        ChannelPayload::Binary(data) => data.len(),
        ChannelPayload::Text(text) => panic!("unexpected text payload {text}"),
    }
}

#[tokio::test]
async fn test_one_mib_file_is_sent_as_metadata_and_four_chunks() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    let (_, channel) = session.connected_peer("p1").await;

    let data = patterned(1024 * 1024);
    session
        .handle
        .broadcast_file(OutgoingFile::from_bytes("big.bin", None, data.clone()))
        .await
        .expect("Failed to broadcast file");

    session
        .next_event(|e| matches!(e, SessionEvent::OutgoingFileCompleted { .. }))
        .await;

    let sent = channel.sent().await;
    assert_eq!(sent.len(), 5, "Expected metadata plus 4 chunks");

    let meta = metadata(&sent[0]);
    assert_eq!(meta.filename, "big.bin");
    assert_eq!(meta.size, 1_048_576);
    assert_eq!(meta.total_chunks, 4);
    assert_eq!(meta.mime_type, "application/octet-stream");

    let mut reassembled = BytesMut::new();
    for payload in &sent[1..] {
        assert_eq!(chunk_len(payload), CHUNK_SIZE);
        if let ChannelPayload::Binary(chunk) = payload {
            reassembled.extend_from_slice(chunk);
        }
    }
    assert_eq!(reassembled.freeze(), data);
}

#[tokio::test]
async fn test_send_file_ends_with_full_offset_and_nothing_in_flight() {
    init_tracing();

    let channel = MockChannel::new("chat");
    let flow = FlowControl::from(&SessionConfig::default());
    let (_alive, mut alive_rx) = watch::channel(true);
    let file = OutgoingFile::from_bytes("big.bin", None, patterned(1024 * 1024));

    let mut progress = Vec::new();
    let transfer = send_file(
        &file,
        TransferId::new(),
        "Fox",
        &channel,
        &flow,
        &mut alive_rx,
        |t| progress.push(t.bytes_sent),
    )
    .await
    .expect("send_file failed");

    assert_eq!(transfer.offset, 1_048_576);
    assert_eq!(transfer.in_flight, 0);
    assert_eq!(transfer.total_chunks(), 4);
    assert!(transfer.is_complete());
    assert!((1..=20).contains(&transfer.window));
    assert_eq!(progress, vec![262_144, 524_288, 786_432, 1_048_576]);
}

#[tokio::test]
async fn test_last_chunk_carries_the_remainder() {
    init_tracing();

    let channel = MockChannel::new("chat");
    let flow = FlowControl::from(&small_chunk_config(4));
    let (_alive, mut alive_rx) = watch::channel(true);
    let file = OutgoingFile::from_bytes("notes.txt", Some("text/plain".to_owned()), patterned(10));

    send_file(&file, TransferId::new(), "Fox", &channel, &flow, &mut alive_rx, |_| {})
        .await
        .expect("send_file failed");

    let sent = channel.sent().await;
    let meta = metadata(&sent[0]);
    assert_eq!(meta.total_chunks, 3);
    assert_eq!(meta.mime_type, "text/plain");
    let lens: Vec<_> = sent[1..].iter().map(chunk_len).collect();
    assert_eq!(lens, vec![4, 4, 2]);
}

#[tokio::test]
async fn test_file_broadcast_before_open_waits_for_channel() {
    init_tracing();

    let mut session = start_session(small_chunk_config(4)).await;
    let link = session.new_peer("p1").await;

    session
        .handle
        .broadcast_file(OutgoingFile::from_bytes("early.bin", None, patterned(10)))
        .await
        .expect("Failed to broadcast file");
    session
        .wait_for_snapshot(|s| s.peer(&peer("p1")).is_some_and(|p| p.queued == 1))
        .await;

    let channel = link.open_channel().await;
    session
        .next_event(|e| matches!(e, SessionEvent::OutgoingFileCompleted { .. }))
        .await;

    let sent = channel.sent().await;
    assert_eq!(metadata(&sent[0]).filename, "early.bin");
    let lens: Vec<_> = sent[1..].iter().map(chunk_len).collect();
    assert_eq!(lens, vec![4, 4, 2]);
}

#[tokio::test]
async fn test_empty_file_sends_only_metadata() {
    init_tracing();

    let mut session = start_session(SessionConfig::default()).await;
    let (_, channel) = session.connected_peer("p1").await;

    session
        .handle
        .broadcast_file(OutgoingFile::from_bytes("empty.txt", None, Bytes::new()))
        .await
        .expect("Failed to broadcast file");
    session
        .next_event(|e| matches!(e, SessionEvent::OutgoingFileCompleted { .. }))
        .await;

    let sent = channel.sent().await;
    assert_eq!(sent.len(), 1);
    let meta = metadata(&sent[0]);
    assert_eq!(meta.size, 0);
    assert_eq!(meta.total_chunks, 0);
}

#[tokio::test]
async fn test_files_to_one_peer_never_interleave() {
    init_tracing();

    let mut session = start_session(small_chunk_config(4)).await;
    let (_, channel) = session.connected_peer("p1").await;

    for name in ["a.bin", "b.bin"] {
        session
            .handle
            .broadcast_file(OutgoingFile::from_bytes(name, None, patterned(12)))
            .await
            .expect("Failed to broadcast file");
    }

    let sent = channel.wait_for_sent(8).await;
    let shape: Vec<_> = sent
        .iter()
        .map(|p| match p {
            ChannelPayload::Text(_) => 'M',
            ChannelPayload::Binary(_) => 'C',
        })
        .collect();
    assert_eq!(shape, vec!['M', 'C', 'C', 'C', 'M', 'C', 'C', 'C']);
    assert_eq!(metadata(&sent[0]).filename, "a.bin");
    assert_eq!(metadata(&sent[4]).filename, "b.bin");
}

#[tokio::test]
async fn test_upload_parked_after_channel_loss_goes_out_on_next_channel() {
    init_tracing();

    let mut session = start_session(small_chunk_config(4)).await;
    let (link, first) = session.connected_peer("p1").await;

    link.close_channel(&first).await;
    session
        .wait_for_snapshot(|s| s.peer(&peer("p1")).is_some_and(|p| !p.channel_open))
        .await;

    session
        .handle
        .broadcast_file(OutgoingFile::from_bytes("later.bin", None, patterned(6)))
        .await
        .expect("Failed to broadcast file");
    session
        .wait_for_snapshot(|s| s.peer(&peer("p1")).is_some_and(|p| p.queued == 1))
        .await;

    let second = link.open_channel().await;
    session
        .next_event(|e| matches!(e, SessionEvent::OutgoingFileCompleted { .. }))
        .await;

    assert!(first.sent().await.is_empty());
    let sent = second.sent().await;
    assert_eq!(metadata(&sent[0]).filename, "later.bin");
    let lens: Vec<_> = sent[1..].iter().map(chunk_len).collect();
    assert_eq!(lens, vec![4, 2]);
}
