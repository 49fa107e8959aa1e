use crate::transfer::{CompletedFile, OutgoingFile};
use bytes::Bytes;
use roomlink_core::{ChatMessage, FileMetadata, PeerId, TransferId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Receiving,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// `None` for files this client sent.
    pub from: Option<PeerId>,
    pub transfer_id: TransferId,
    pub sender: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub progress: u8,
    pub state: FileState,
    pub artifact: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEntry {
    Chat {
        from: Option<PeerId>,
        message: ChatMessage,
    },
    File(FileEntry),
}

/// Chat and file history in arrival order. File placeholders are updated in
/// place; completed artifacts stay after the transfer state is gone.
#[derive(Debug, Default)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
}

impl Conversation {
    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn push_chat(&mut self, from: Option<PeerId>, message: ChatMessage) {
        self.entries.push(ConversationEntry::Chat { from, message });
    }

    /// Records a file this client broadcast. It is complete from the local
    /// point of view.
    pub fn push_local_file(&mut self, transfer_id: TransferId, sender: &str, file: &OutgoingFile) {
        self.entries.push(ConversationEntry::File(FileEntry {
            from: None,
            transfer_id,
            sender: sender.to_owned(),
            filename: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size,
            progress: 100,
            state: FileState::Completed,
            artifact: file.bytes().cloned(),
        }));
    }

    pub fn file_started(&mut self, peer: &PeerId, meta: &FileMetadata) {
        self.entries.push(ConversationEntry::File(FileEntry {
            from: Some(peer.clone()),
            transfer_id: meta.transfer_id,
            sender: meta.sender.clone(),
            filename: meta.filename.clone(),
            mime_type: meta.mime_type.clone(),
            size: meta.size,
            progress: 0,
            state: FileState::Receiving,
            artifact: None,
        }));
    }

    pub fn file_progress(&mut self, peer: &PeerId, transfer_id: TransferId, progress: u8) {
        if let Some(entry) = self.receiving_mut(peer, transfer_id) {
            entry.progress = progress;
        }
    }

    /// Fills the placeholder with the artifact, or appends a completed entry
    /// when there was none (empty files complete on announcement).
    pub fn file_completed(&mut self, peer: &PeerId, file: &CompletedFile) {
        if let Some(entry) = self.receiving_mut(peer, file.transfer_id) {
            entry.progress = 100;
            entry.state = FileState::Completed;
            entry.artifact = Some(file.data.clone());
            return;
        }

        self.entries.push(ConversationEntry::File(FileEntry {
            from: Some(peer.clone()),
            transfer_id: file.transfer_id,
            sender: file.sender.clone(),
            filename: file.filename.clone(),
            mime_type: file.mime_type.clone(),
            size: file.data.len() as u64,
            progress: 100,
            state: FileState::Completed,
            artifact: Some(file.data.clone()),
        }));
    }

    pub fn file_failed(&mut self, peer: &PeerId, transfer_id: TransferId) {
        if let Some(entry) = self.receiving_mut(peer, transfer_id) {
            entry.state = FileState::Failed;
        }
    }

    fn receiving_mut(&mut self, peer: &PeerId, transfer_id: TransferId) -> Option<&mut FileEntry> {
        self.entries.iter_mut().rev().find_map(|entry| match entry {
            ConversationEntry::File(file)
                if file.state == FileState::Receiving
                    && file.transfer_id == transfer_id
                    && file.from.as_ref() == Some(peer) =>
            {
                Some(file)
            }
            _ => None,
        })
    }
}
