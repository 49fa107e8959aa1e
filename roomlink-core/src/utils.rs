/// Fixed size of every binary chunk except the last one of a file.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Buffered-byte threshold above which a sender must pause.
pub const HIGH_WATER_MARK: usize = 8 * 1024 * 1024;

pub const INITIAL_WINDOW: usize = 5;
pub const MIN_WINDOW: usize = 1;
pub const MAX_WINDOW: usize = 20;

pub const DEFAULT_MIME: &str = "application/octet-stream";

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_3: &str = "stun:stun2.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_4: &str = "stun:stun3.l.google.com:19302";

/// Number of chunks needed to carry `size` bytes, `ceil(size / chunk_size)`.
pub fn total_chunks(size: u64, chunk_size: usize) -> u64 {
    let chunk_size = chunk_size.max(1) as u64;
    size.div_ceil(chunk_size)
}
