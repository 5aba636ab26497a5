use futures_util::StreamExt;
use lens_core::AgentEvent;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use url::Url;

pub const RECONNECT_DELAY_MS: u64 = 3000;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Persistent event-stream connection. One websocket at a time; a closed
/// or failed connection is retried after a fixed delay, forever; the
/// feed is meant to recover silently for the lifetime of the consumer.
///
/// The stream carries no sequence numbers, so events emitted while
/// disconnected are lost with no gap-detection signal; the only surfaced
/// effect is the `connected` flag flipping.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: Url,
    pub reconnect_delay: Duration,
}

impl FeedConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
        }
    }

    /// Spawns the connection task and hands back the consumer side:
    /// parsed events in arrival order plus a connectivity flag.
    pub fn spawn(self) -> FeedHandle {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (connected_tx, connected_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(feed_loop(self, events_tx, connected_tx, shutdown_rx));
        FeedHandle {
            events: events_rx,
            connected: connected_rx,
            shutdown: shutdown_tx,
            task,
        }
    }
}

pub struct FeedHandle {
    pub events: mpsc::Receiver<AgentEvent>,
    pub connected: watch::Receiver<bool>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Cancels any pending reconnect sleep, closes the active connection
    /// and waits for the task to finish. Used only on teardown.
    pub async fn disconnect(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn feed_loop(
    cfg: FeedConfig,
    events_tx: mpsc::Sender<AgentEvent>,
    connected_tx: watch::Sender<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let mut ws = tokio::select! {
            connect = connect_async(cfg.url.as_str()) => match connect {
                Ok((ws, _)) => ws,
                Err(err) => {
                    warn!("feed_connect_error: {err}");
                    if sleep_or_shutdown(cfg.reconnect_delay, &mut shutdown_rx).await {
                        return;
                    }
                    continue;
                }
            },
            _ = shutdown_rx.changed() => return,
        };
        let _ = connected_tx.send(true);
        info!("feed_connected: {}", cfg.url);

        loop {
            tokio::select! {
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        match AgentEvent::parse(&text) {
                            Ok(event) => {
                                // Consumer gone means teardown; stop quietly.
                                if events_tx.send(event).await.is_err() {
                                    let _ = ws.close(None).await;
                                    let _ = connected_tx.send(false);
                                    return;
                                }
                            }
                            Err(err) => warn!("feed_event_parse_error: {err}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("feed_read_error: {err}");
                        break;
                    }
                },
                _ = shutdown_rx.changed() => {
                    let _ = ws.close(None).await;
                    let _ = connected_tx.send(false);
                    return;
                }
            }
        }

        let _ = connected_tx.send(false);
        warn!("feed_disconnected: retrying in {:?}", cfg.reconnect_delay);
        if sleep_or_shutdown(cfg.reconnect_delay, &mut shutdown_rx).await {
            return;
        }
    }
}

/// Fixed-delay reconnect sleep; true when shutdown arrived instead.
async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown_rx.changed() => true,
    }
}
