use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::bus::envelope::Envelope;
use crate::config::BusSettings;
use crate::utils::error::BusError;

/// Handle to the cross-instance relay.
///
/// `publish` is fire-and-forget: the envelope goes onto a bounded queue
/// drained by a background session task that owns the WebSocket to the
/// relay endpoint. When the relay is unreachable the session reconnects on
/// a fixed backoff and queued traffic is discarded; live messages are
/// stale by the time the connection comes back, and the durable path has
/// its own copy.
#[derive(Debug, Clone)]
pub struct RelayBus {
    instance_id: String,
    channel: String,
    outgoing: mpsc::Sender<Envelope>,
}

impl RelayBus {
    /// Spawns the relay session task and returns the publish handle.
    ///
    /// `on_remote` is invoked once per payload received from another
    /// instance; envelopes that originated here are filtered out before it
    /// is called.
    pub fn start<H>(settings: &BusSettings, url: String, instance_id: String, on_remote: H) -> Self
    where
        H: Fn(String) + Send + Sync + 'static,
    {
        let (outgoing, rx) = mpsc::channel(settings.publish_queue);
        let backoff = Duration::from_millis(settings.reconnect_backoff_ms);
        let channel = settings.channel.clone();

        tokio::spawn(run_sessions(
            url,
            channel.clone(),
            instance_id.clone(),
            rx,
            backoff,
            on_remote,
        ));

        Self {
            instance_id,
            channel,
            outgoing,
        }
    }

    /// Best-effort fan-out to the other instances. Returns before remote
    /// delivery is confirmed; failure is logged and swallowed.
    pub fn publish(&self, message: &str) {
        if let Err(e) = self.try_publish(message) {
            warn!("bus publish dropped: {e}");
        }
    }

    fn try_publish(&self, message: &str) -> Result<(), BusError> {
        let envelope = Envelope {
            origin: self.instance_id.clone(),
            channel: self.channel.clone(),
            message: message.to_string(),
        };
        self.outgoing
            .try_send(envelope)
            .map_err(|_| BusError::QueueFull)
    }
}

/// Keeps one relay session alive, reconnecting on a fixed backoff.
async fn run_sessions<H>(
    url: String,
    channel: String,
    instance_id: String,
    mut rx: mpsc::Receiver<Envelope>,
    backoff: Duration,
    on_remote: H,
) where
    H: Fn(String) + Send + Sync + 'static,
{
    loop {
        match session(&url, &channel, &instance_id, &mut rx, &on_remote).await {
            Ok(()) => info!("relay session at {url} ended; reconnecting"),
            Err(e) => warn!("relay session at {url} failed: {e}"),
        }

        tokio::time::sleep(backoff).await;

        // Anything queued while disconnected is stale live traffic; drop
        // it so reconnects never burst.
        loop {
            match rx.try_recv() {
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("bus handle dropped; ending relay session task");
                    return;
                }
            }
        }
    }
}

/// One connected session: drains the publish queue into the relay and
/// dispatches inbound envelopes until either side fails.
async fn session<H>(
    url: &str,
    channel: &str,
    instance_id: &str,
    rx: &mut mpsc::Receiver<Envelope>,
    on_remote: &H,
) -> Result<(), BusError>
where
    H: Fn(String) + Send + Sync + 'static,
{
    let (ws_stream, _) = connect_async(url).await?;
    info!("connected to relay at {url}");
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(envelope) = outbound else {
                    return Ok(());
                };
                let text = serde_json::to_string(&envelope)?;
                sink.send(WsMessage::text(text)).await?;
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<Envelope>(&text) {
                            Ok(envelope) if envelope.is_remote(channel, instance_id) => {
                                on_remote(envelope.message);
                            }
                            Ok(_) => {} // our own publish, echoed back
                            Err(e) => warn!("ignoring malformed bus frame: {e}"),
                        }
                    }
                    Some(Ok(_)) => {} // ping/pong/binary
                    Some(Err(e)) => return Err(BusError::Connection(e)),
                    None => return Ok(()),
                }
            }
        }
    }
}
