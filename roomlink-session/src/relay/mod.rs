mod relay_config;
mod relay_outbox;
mod relay_sink;
mod ws_relay;

pub use relay_config::*;
pub use relay_outbox::*;
pub use relay_sink::*;
pub use ws_relay::*;
