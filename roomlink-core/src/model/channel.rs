use crate::model::transfer::TransferId;
use crate::utils::DEFAULT_MIME;
use serde::{Deserialize, Serialize};

/// Plain chat line: `{sender, message}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
}

/// Announces a file; always sent before any of its binary chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default)]
    pub sender: String,
    pub filename: String,
    pub size: u64,
    pub total_chunks: u64,
    #[serde(rename = "fileId", alias = "transferId")]
    pub transfer_id: TransferId,
    #[serde(rename = "type", default = "default_mime")]
    pub mime_type: String,
}

fn default_mime() -> String {
    DEFAULT_MIME.to_owned()
}

/// Text payloads exchanged over a data channel. Binary payloads are file
/// chunks and never go through this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChannelMessage {
    // Tried in order: anything with `sender` and `message` is a chat line.
    Chat(ChatMessage),
    FileMetadata(FileMetadata),
}

impl ChannelMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
