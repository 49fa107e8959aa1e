use crate::config::SessionConfig;
use crate::error::{TransferError, TransportError};
use crate::transfer::{AdaptiveWindow, OutgoingFile};
use crate::transport::Channel;
use futures::StreamExt;
use futures::stream::FuturesOrdered;
use roomlink_core::utils::total_chunks;
use roomlink_core::{ChannelMessage, FileMetadata, TransferId};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Flow-control knobs of the send path.
#[derive(Debug, Clone, Copy)]
pub struct FlowControl {
    pub chunk_size: usize,
    pub high_water_mark: usize,
    pub initial_window: usize,
    pub min_window: usize,
    pub max_window: usize,
    pub backpressure_poll: Duration,
}

impl From<&SessionConfig> for FlowControl {
    fn from(config: &SessionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            high_water_mark: config.high_water_mark,
            initial_window: config.initial_window,
            min_window: config.min_window,
            max_window: config.max_window,
            backpressure_poll: config.backpressure_poll,
        }
    }
}

/// Sender-side state of one (file, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingTransfer {
    pub transfer_id: TransferId,
    pub filename: String,
    pub total_size: u64,
    pub chunk_size: usize,
    /// Bytes sliced off the file so far.
    pub offset: u64,
    /// Bytes handed to the channel so far.
    pub bytes_sent: u64,
    pub in_flight: usize,
    pub window: usize,
}

impl OutgoingTransfer {
    pub fn total_chunks(&self) -> u64 {
        total_chunks(self.total_size, self.chunk_size)
    }

    pub fn is_complete(&self) -> bool {
        self.offset == self.total_size && self.in_flight == 0
    }
}

/// Sends `file` over `channel`: one metadata message, then the chunks in
/// offset order.
///
/// Up to `window` chunk reads run concurrently; sends leave strictly in
/// order because the receiver concatenates in arrival order. Before each
/// send the loop waits while the channel buffers more than the high-water
/// mark. `alive` flipping to `false` (or its sender being dropped) stops the
/// loop with `TransferError::Cancelled`.
pub async fn send_file<F>(
    file: &OutgoingFile,
    transfer_id: TransferId,
    sender: &str,
    channel: &dyn Channel,
    flow: &FlowControl,
    alive: &mut watch::Receiver<bool>,
    mut on_progress: F,
) -> Result<OutgoingTransfer, TransferError>
where
    F: FnMut(&OutgoingTransfer),
{
    let mut window = AdaptiveWindow::new(flow.initial_window, flow.min_window, flow.max_window);
    let mut transfer = OutgoingTransfer {
        transfer_id,
        filename: file.name.clone(),
        total_size: file.size,
        chunk_size: flow.chunk_size,
        offset: 0,
        bytes_sent: 0,
        in_flight: 0,
        window: window.current(),
    };

    let metadata = ChannelMessage::FileMetadata(FileMetadata {
        sender: sender.to_owned(),
        filename: file.name.clone(),
        size: file.size,
        total_chunks: transfer.total_chunks(),
        transfer_id,
        mime_type: file.mime_type.clone(),
    });
    ensure_alive(alive)?;
    channel.send_text(metadata.to_json()?).await?;
    info!(
        transfer = %transfer_id,
        file = %file.name,
        size = file.size,
        chunks = transfer.total_chunks(),
        "sending file"
    );

    let mut reads = FuturesOrdered::new();
    loop {
        while reads.len() < window.current() && transfer.offset < transfer.total_size {
            let start = transfer.offset;
            let len = (transfer.total_size - start).min(flow.chunk_size as u64) as usize;
            transfer.offset += len as u64;
            reads.push_back(file.read_chunk(start, len));
        }
        transfer.in_flight = reads.len();

        let Some(chunk) = reads.next().await else {
            break;
        };
        let chunk = chunk?;

        wait_for_buffer(channel, flow, alive).await?;
        let len = chunk.len() as u64;
        channel.send_binary(chunk).await?;

        transfer.bytes_sent += len;
        transfer.in_flight = reads.len();
        let buffered = channel.buffered_amount().await;
        transfer.window = window.adapt(buffered, flow.high_water_mark);
        on_progress(&transfer);
    }

    transfer.in_flight = 0;
    debug!(transfer = %transfer_id, window = transfer.window, "file sent");
    Ok(transfer)
}

fn ensure_alive(alive: &watch::Receiver<bool>) -> Result<(), TransferError> {
    if *alive.borrow() {
        Ok(())
    } else {
        Err(TransferError::Cancelled)
    }
}

/// Suspends while the channel holds more than the high-water mark. Wakes on
/// the transport's drain signal, on a poll tick, or when the peer goes away.
async fn wait_for_buffer(
    channel: &dyn Channel,
    flow: &FlowControl,
    alive: &mut watch::Receiver<bool>,
) -> Result<(), TransferError> {
    loop {
        ensure_alive(alive)?;
        if !channel.is_open() {
            return Err(TransportError::ChannelClosed.into());
        }

        let buffered = channel.buffered_amount().await;
        if buffered <= flow.high_water_mark {
            return Ok(());
        }
        debug!(
            channel = %channel.id(),
            buffered,
            high_water_mark = flow.high_water_mark,
            "applying backpressure"
        );

        tokio::select! {
            _ = channel.buffered_amount_low() => {}
            _ = tokio::time::sleep(flow.backpressure_poll) => {}
            changed = alive.changed() => {
                if changed.is_err() {
                    return Err(TransferError::Cancelled);
                }
            }
        }
    }
}
