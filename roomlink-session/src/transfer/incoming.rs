use crate::error::ProtocolError;
use bytes::{Bytes, BytesMut};
use roomlink_core::{FileMetadata, PeerId, TransferId};
use std::collections::VecDeque;

/// Receiver-side state of one announced file.
#[derive(Debug)]
pub struct IncomingTransfer {
    pub transfer_id: TransferId,
    pub sender: String,
    pub filename: String,
    pub mime_type: String,
    pub total_size: u64,
    pub bytes_received: u64,
    chunks: Vec<Bytes>,
}

impl IncomingTransfer {
    pub fn from_metadata(meta: &FileMetadata, fallback_sender: &str) -> Self {
        let sender = if meta.sender.is_empty() {
            fallback_sender.to_owned()
        } else {
            meta.sender.clone()
        };
        Self {
            transfer_id: meta.transfer_id,
            sender,
            filename: meta.filename.clone(),
            mime_type: meta.mime_type.clone(),
            total_size: meta.size,
            bytes_received: 0,
            chunks: Vec::new(),
        }
    }

    /// `floor(100 * received / total)`, capped at 100.
    pub fn progress(&self) -> u8 {
        if self.total_size == 0 {
            return 100;
        }
        let pct = (self.bytes_received as u128 * 100) / self.total_size as u128;
        pct.min(100) as u8
    }

    pub fn remaining(&self) -> u64 {
        self.total_size - self.bytes_received
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_received == self.total_size
    }

    fn append(&mut self, chunk: Bytes) -> Result<(), ProtocolError> {
        if chunk.len() as u64 > self.remaining() {
            return Err(ProtocolError::TransferOverflow {
                transfer: self.transfer_id,
                chunk: chunk.len(),
                remaining: self.remaining(),
            });
        }
        self.bytes_received += chunk.len() as u64;
        self.chunks.push(chunk);
        Ok(())
    }

    fn assemble(self) -> CompletedFile {
        let data = if self.chunks.len() == 1 {
            self.chunks.into_iter().next().unwrap_or_default()
        } else {
            let mut buf = BytesMut::with_capacity(self.total_size as usize);
            for chunk in &self.chunks {
                buf.extend_from_slice(chunk);
            }
            buf.freeze()
        };
        CompletedFile {
            transfer_id: self.transfer_id,
            sender: self.sender,
            filename: self.filename,
            mime_type: self.mime_type,
            data,
        }
    }
}

/// Immutable artifact produced once every byte of a transfer arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFile {
    pub transfer_id: TransferId,
    pub sender: String,
    pub filename: String,
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Registered {
    /// Queued; chunks will follow.
    Pending,
    /// Nothing to wait for (zero-length file).
    Completed(CompletedFile),
}

#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    Progress {
        transfer_id: TransferId,
        progress: u8,
        bytes_received: u64,
    },
    Completed(CompletedFile),
}

/// Incoming transfers announced on one channel.
///
/// Only one transfer per channel is filled at a time: binary chunks always
/// go to the oldest unfinished registration, and later registrations wait
/// their turn.
#[derive(Debug, Default)]
pub struct ChannelReceiver {
    transfers: VecDeque<IncomingTransfer>,
}

impl ChannelReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        meta: &FileMetadata,
        fallback_sender: &str,
    ) -> Result<Registered, ProtocolError> {
        if self
            .transfers
            .iter()
            .any(|t| t.transfer_id == meta.transfer_id)
        {
            return Err(ProtocolError::DuplicateTransfer {
                transfer: meta.transfer_id,
            });
        }

        let transfer = IncomingTransfer::from_metadata(meta, fallback_sender);
        if transfer.total_size == 0 {
            return Ok(Registered::Completed(transfer.assemble()));
        }
        self.transfers.push_back(transfer);
        Ok(Registered::Pending)
    }

    /// Appends `chunk` to the active transfer. An overflowing chunk discards
    /// that transfer.
    pub fn accept_chunk(
        &mut self,
        peer: &PeerId,
        chunk: Bytes,
    ) -> Result<ChunkOutcome, ProtocolError> {
        let Some(active) = self.transfers.front_mut() else {
            return Err(ProtocolError::UnattributedChunk { peer: peer.clone() });
        };

        if let Err(e) = active.append(chunk) {
            self.transfers.pop_front();
            return Err(e);
        }

        if !active.is_complete() {
            return Ok(ChunkOutcome::Progress {
                transfer_id: active.transfer_id,
                progress: active.progress(),
                bytes_received: active.bytes_received,
            });
        }

        match self.transfers.pop_front() {
            Some(done) => Ok(ChunkOutcome::Completed(done.assemble())),
            None => Err(ProtocolError::UnattributedChunk { peer: peer.clone() }),
        }
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Drops every unfinished transfer, returning them for reporting.
    pub fn discard_all(&mut self) -> Vec<IncomingTransfer> {
        self.transfers.drain(..).collect()
    }
}
