use crate::error::TransferError;
use crate::session::SessionEvent;
use crate::transfer::{FlowControl, OutgoingFile, send_file};
use crate::transport::Channel;
use roomlink_core::{PeerId, TransferId};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// One file queued for one destination.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub file: Arc<OutgoingFile>,
    pub transfer_id: TransferId,
    pub sender_name: String,
}

/// Spawns the task that sends a peer's files over `channel`, one at a time.
///
/// Files never interleave on the channel: the receiver attributes chunks to
/// the oldest unfinished transfer. The task ends when every job sender is
/// dropped or when the peer session stops being alive.
pub(crate) fn spawn_upload_worker(
    peer: PeerId,
    channel: Arc<dyn Channel>,
    flow: FlowControl,
    mut alive: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> mpsc::UnboundedSender<UploadJob> {
    let (job_tx, mut job_rx) = mpsc::unbounded_channel::<UploadJob>();

    tokio::spawn(async move {
        while let Some(job) = job_rx.recv().await {
            let transfer_id = job.transfer_id;
            let total_size = job.file.size;

            let result = send_file(
                &job.file,
                transfer_id,
                &job.sender_name,
                channel.as_ref(),
                &flow,
                &mut alive,
                |progress| {
                    let _ = events.send(SessionEvent::OutgoingFileProgress {
                        peer: peer.clone(),
                        transfer_id,
                        bytes_sent: progress.bytes_sent,
                        total_size,
                    });
                },
            )
            .await;

            match result {
                Ok(done) => {
                    info!(peer = %peer, transfer = %transfer_id, bytes = done.bytes_sent, "upload finished");
                    let _ = events.send(SessionEvent::OutgoingFileCompleted {
                        peer: peer.clone(),
                        transfer_id,
                    });
                }
                Err(e) => {
                    warn!(peer = %peer, transfer = %transfer_id, error = %e, "upload failed");
                    let _ = events.send(SessionEvent::OutgoingFileFailed {
                        peer: peer.clone(),
                        transfer_id,
                        reason: e.to_string(),
                    });
                    if matches!(e, TransferError::Cancelled) {
                        break;
                    }
                }
            }
        }

        // Jobs still queued behind a cancellation never start.
        job_rx.close();
        while let Ok(job) = job_rx.try_recv() {
            let _ = events.send(SessionEvent::OutgoingFileFailed {
                peer: peer.clone(),
                transfer_id: job.transfer_id,
                reason: TransferError::Cancelled.to_string(),
            });
        }
    });

    job_tx
}
