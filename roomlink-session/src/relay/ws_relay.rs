use crate::error::RelayError;
use crate::relay::{RelayConfig, RelayEvent, RelaySink};
use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// WebSocket connection to the relay. A background task keeps it connected,
/// reconnecting after `RelayConfig::reconnect_delay`, until this handle is
/// dropped.
pub struct WsRelay {
    outgoing: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WsRelay {
    pub fn connect(config: RelayConfig) -> (Self, mpsc::Receiver<RelayEvent>) {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(256);
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_connection(
            config,
            outgoing_rx,
            events_tx,
            connected.clone(),
        ));

        (
            Self {
                outgoing,
                connected,
                task,
            },
            events_rx,
        )
    }
}

impl Drop for WsRelay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl RelaySink for WsRelay {
    async fn send(&self, text: String) -> Result<(), RelayError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(RelayError::NotConnected);
        }
        self.outgoing
            .send(text)
            .map_err(|_| RelayError::NotConnected)
    }
}

async fn run_connection(
    config: RelayConfig,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<RelayEvent>,
    connected: Arc<AtomicBool>,
) {
    // Envelope whose write failed; it goes out first on the next connection.
    let mut held: Option<String> = None;

    loop {
        info!(url = %config.url, "connecting to relay");
        match connect_async(config.url.as_str()).await {
            Ok((ws_stream, _)) => {
                let (mut ws_write, mut ws_read) = ws_stream.split();
                let resent = match held.take() {
                    Some(text) => write_or_hold(&mut ws_write, text, &mut held).await,
                    None => true,
                };

                if resent {
                    connected.store(true, Ordering::Release);
                    if events.send(RelayEvent::Opened).await.is_err() {
                        return;
                    }

                    loop {
                        tokio::select! {
                            out = outgoing.recv() => {
                                let Some(text) = out else {
                                    return;
                                };
                                if !write_or_hold(&mut ws_write, text, &mut held).await {
                                    break;
                                }
                            }

                            msg = ws_read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        if events.send(RelayEvent::Message(text)).await.is_err() {
                                            return;
                                        }
                                    }
                                    Some(Ok(Message::Close(frame))) => {
                                        debug!(?frame, "relay closed the connection");
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        warn!(error = %e, "relay read failed");
                                        break;
                                    }
                                    None => break,
                                }
                            }
                        }
                    }

                    connected.store(false, Ordering::Release);
                    if events.send(RelayEvent::Closed).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(url = %config.url, error = %e, "relay connection failed"),
        }

        tokio::time::sleep(config.reconnect_delay).await;
    }
}

/// Writes `text`, keeping it in `held` when the write fails.
async fn write_or_hold<S>(ws_write: &mut S, text: String, held: &mut Option<String>) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match ws_write.send(Message::Text(text.clone())).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "relay write failed, holding envelope");
            *held = Some(text);
            false
        }
    }
}
