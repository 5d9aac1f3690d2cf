use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{info, warn};
use tungstenite::protocol::Message as WsMessage;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pipeline::Pipeline;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::TransportError;

/// Accepts client connections and runs one handler task per connection.
///
/// Each connection gets a bounded outgoing buffer; its sending half is
/// registered with the connection registry and its receiving half is
/// drained by a forward task into the WebSocket. The read loop translates
/// `submit` frames into pipeline submissions.
pub async fn start_websocket_server(
    addr: String,
    pipeline: Pipeline,
    send_buffer: usize,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!("listening on ws://{addr}");

    while let Ok((stream, _)) = listener.accept().await {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            handle_connection(stream, pipeline, send_buffer).await;
        });
    }

    Ok(())
}

async fn handle_connection(stream: TcpStream, pipeline: Pipeline, send_buffer: usize) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<WsMessage>(send_buffer);
    let connection_id = pipeline.registry().lock().unwrap().register(tx);
    info!("{connection_id} connected");

    // The id is exposed to the client for diagnostic display only.
    let hello = ServerMessage::Connected {
        connection_id: connection_id.clone(),
    };
    match serde_json::to_string(&hello) {
        Ok(frame) => {
            if ws_sender.send(WsMessage::text(frame)).await.is_err() {
                pipeline.registry().lock().unwrap().unregister(&connection_id);
                return;
            }
        }
        Err(e) => warn!("failed to encode connected frame: {e}"),
    }

    let cleanup_called = Arc::new(AtomicBool::new(false));

    let do_cleanup = {
        let registry = pipeline.registry().clone();
        let connection_id = connection_id.clone();
        let cleanup_called = cleanup_called.clone();

        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                registry.lock().unwrap().unregister(&connection_id);
                info!("{connection_id} disconnected");
            }
        }
    };

    // Forward messages from the registry's fan-out into this connection.
    {
        let do_cleanup = do_cleanup.clone();
        spawn(async move {
            while let Some(message) = rx.recv().await {
                if ws_sender.send(message).await.is_err() {
                    break;
                }
            }
            do_cleanup();
        });
    }

    while let Some(Ok(message)) = ws_receiver.next().await {
        if let WsMessage::Text(text) = message {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Submit { message }) => {
                    pipeline.submit(&connection_id, &message).await;
                }
                Err(err) => {
                    warn!(
                        "invalid frame from {connection_id}: {err} | {}",
                        &text.chars().take(100).collect::<String>()
                    );
                }
            }
        }
    }

    do_cleanup();
}
