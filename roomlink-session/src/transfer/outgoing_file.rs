use bytes::Bytes;
use roomlink_core::utils::DEFAULT_MIME;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Bytes),
    Path(PathBuf),
}

/// A file offered to the room. Chunks are read lazily, one slice at a time.
#[derive(Debug, Clone)]
pub struct OutgoingFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl OutgoingFile {
    pub fn from_bytes(name: impl Into<String>, mime_type: Option<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.unwrap_or_else(|| DEFAULT_MIME.to_owned()),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_owned();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();

        Ok(Self {
            name,
            mime_type,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// In-memory contents, if the file is held in memory.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.source {
            FileSource::Memory(data) => Some(data),
            FileSource::Path(_) => None,
        }
    }

    pub async fn read_chunk(&self, offset: u64, len: usize) -> std::io::Result<Bytes> {
        match &self.source {
            FileSource::Memory(data) => {
                let start = offset as usize;
                let end = start.saturating_add(len).min(data.len());
                if start > end {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "chunk offset past end of file",
                    ));
                }
                Ok(data.slice(start..end))
            }
            FileSource::Path(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(offset)).await?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}
