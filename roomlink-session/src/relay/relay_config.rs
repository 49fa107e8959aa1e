use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub url: String,
    pub reconnect_delay: Duration,
}

impl RelayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(2),
        }
    }
}
