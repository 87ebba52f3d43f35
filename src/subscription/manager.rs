use crate::state::{Subscription, World};
use crate::subscription::protocol::parse_inbound;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long a finished session waits for the close handshake to flush
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives one subscriber connection
///
/// The writer half forwards the listener's queue (snapshot first, then
/// broadcasts) to the socket. The reader half applies inbound entity writes
/// to the world. Whichever half finishes first ends the session.
pub struct Session {
    world: Arc<World>,
    subscription: Subscription,
}

impl Session {
    pub fn new(world: Arc<World>, subscription: Subscription) -> Self {
        Self {
            world,
            subscription,
        }
    }

    pub fn id(&self) -> Uuid {
        self.subscription.id
    }

    /// Handle WebSocket connection lifecycle
    pub async fn run(self, socket: WebSocket) {
        let Session {
            world,
            subscription,
        } = self;
        let Subscription { id, mut rx } = subscription;

        info!(listener_id = %id, "WebSocket connection established");

        let (mut sink, stream) = socket.split();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let mut writer = tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    msg = rx.recv() => msg,
                    _ = &mut stop_rx => break,
                };
                let Some(msg) = msg else {
                    info!(listener_id = %id, "Listener disconnected by hub");
                    break;
                };
                if let Err(e) = sink.send(Message::Text(msg.to_string())).await {
                    debug!(listener_id = %id, error = %e, "Failed to send to listener");
                    return;
                }
            }
            // Completes the closing handshake, flushing any pending close reply
            let _ = sink.close().await;
        });

        let mut reader = tokio::spawn(read_loop(stream, Arc::clone(&world), id));

        tokio::select! {
            _ = &mut writer => reader.abort(),
            _ = &mut reader => {
                let _ = stop_tx.send(());
                if timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
                    warn!(listener_id = %id, "Timed out closing WebSocket");
                    writer.abort();
                }
            }
        }

        // Queue receiver is gone now; drop the listener without waiting for
        // the next broadcast
        world.hub().prune();

        info!(listener_id = %id, "WebSocket connection closed");
    }
}

async fn read_loop(mut stream: SplitStream<WebSocket>, world: Arc<World>, id: Uuid) {
    // Pings are answered by the WebSocket layer
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                apply_inbound(&world, id, &text);
            }
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    apply_inbound(&world, id, text);
                }
                Err(_) => warn!(listener_id = %id, "Ignoring non-UTF-8 binary frame"),
            },
            Ok(Message::Close(_)) => {
                info!(listener_id = %id, "WebSocket client disconnected");
                break;
            }
            Ok(_) => {
                // Ignore ping/pong
            }
            Err(e) => {
                warn!(listener_id = %id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Apply one inbound frame, returning how many entities were set
///
/// Malformed frames are logged and ignored.
pub fn apply_inbound(world: &World, listener_id: Uuid, text: &str) -> usize {
    let update = match parse_inbound(text) {
        Ok(update) => update,
        Err(e) => {
            warn!(listener_id = %listener_id, error = %e, "Ignoring malformed message");
            return 0;
        }
    };

    for name in &update.skipped {
        warn!(listener_id = %listener_id, entity = %name, "Ignoring non-object entity data");
    }

    let applied = update.entities.len();
    for (name, data) in update.entities {
        world.set(&name, data);
    }
    applied
}
