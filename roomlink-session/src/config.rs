use crate::queue::OverflowPolicy;
use crate::transport::TransportConfig;
use roomlink_core::utils::{CHUNK_SIZE, HIGH_WATER_MARK, INITIAL_WINDOW, MAX_WINDOW, MIN_WINDOW};
use std::time::Duration;

/// Tunables for one session. `Default` reproduces the wire protocol's
/// constants; tests shrink them to keep payloads small.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    pub channel_label: String,
    pub chunk_size: usize,
    pub high_water_mark: usize,
    pub initial_window: usize,
    pub min_window: usize,
    pub max_window: usize,
    pub backpressure_poll: Duration,
    pub peer_queue_capacity: usize,
    pub relay_queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            channel_label: "chat".to_owned(),
            chunk_size: CHUNK_SIZE,
            high_water_mark: HIGH_WATER_MARK,
            initial_window: INITIAL_WINDOW,
            min_window: MIN_WINDOW,
            max_window: MAX_WINDOW,
            backpressure_poll: Duration::from_millis(20),
            peer_queue_capacity: 1024,
            relay_queue_capacity: 1024,
            overflow_policy: OverflowPolicy::Reject,
        }
    }
}
