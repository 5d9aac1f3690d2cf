use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::utils::error::TransportError;

/// Minimal relay endpoint for the bus: every text frame received from any
/// peer is forwarded to every connected peer, the sender included.
/// Self-suppression is the subscribers' job via the envelope origin tag.
///
/// This is the shared piece of infrastructure multi-instance deployments
/// point `bus.relay_url` at; tests run it in-process.
pub async fn start_relay_server(addr: String) -> Result<(), TransportError> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!("relay listening on ws://{addr}");

    let peers: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<WsMessage>>>> = Arc::default();

    while let Ok((stream, _)) = listener.accept().await {
        let peers = peers.clone();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("relay handshake failed: {e}");
                    return;
                }
            };

            let peer_id = format!("peer-{}", Uuid::new_v4());
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
            peers.lock().unwrap().insert(peer_id.clone(), tx);
            debug!("relay peer {peer_id} joined");

            let forward = tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    if ws_sender.send(message).await.is_err() {
                        break;
                    }
                }
            });

            while let Some(Ok(message)) = ws_receiver.next().await {
                if message.is_text() {
                    let peers = peers.lock().unwrap();
                    for sender in peers.values() {
                        let _ = sender.send(message.clone());
                    }
                }
            }

            peers.lock().unwrap().remove(&peer_id);
            debug!("relay peer {peer_id} left");
            forward.abort();
        });
    }

    Ok(())
}
