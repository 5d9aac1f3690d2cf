use std::collections::HashMap;

use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::registry::connection::{Connection, ConnectionId};

/// Tracks live client connections and fans messages out to them.
///
/// Membership mutations and broadcast enumeration happen under the same
/// exclusive lock (callers hold this behind `Arc<Mutex<_>>`), so a
/// connection is never delivered to after it is unregistered and never
/// double-registered under one identifier. Callers must not hold the lock
/// across I/O; every send here is a non-blocking `try_send`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Accepts a live connection and adds it to the membership set.
    ///
    /// Always succeeds while the registry is running; the returned
    /// identifier is unique for the connection's lifetime.
    pub fn register(&mut self, sender: Sender<WsMessage>) -> ConnectionId {
        let connection = Connection::new(sender);
        let id = connection.id.clone();
        self.connections.insert(id.clone(), connection);
        debug!("registered {id}");
        id
    }

    /// Removes a connection from the membership set. Unregistering an id
    /// that is already absent is a no-op.
    pub fn unregister(&mut self, id: &ConnectionId) {
        if self.connections.remove(id).is_some() {
            debug!("unregistered {id}");
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Delivers `text` to every registered connection other than
    /// `sender_id`. Side effect only; a connection whose outgoing buffer
    /// is full has this message dropped.
    pub fn broadcast_except_sender(&mut self, text: &str, sender_id: &ConnectionId) {
        self.fan_out(text, Some(sender_id));
    }

    /// Delivers `text` to every registered connection. Used for messages
    /// arriving from the bus: the originating instance already excluded
    /// its own sender before publishing.
    pub fn broadcast_all(&mut self, text: &str) {
        self.fan_out(text, None);
    }

    fn fan_out(&mut self, text: &str, exclude: Option<&ConnectionId>) {
        let message = WsMessage::text(text);
        for connection in self.connections.values_mut() {
            if Some(&connection.id) == exclude {
                continue;
            }
            match connection.sender.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "outgoing buffer full for {}; dropping message",
                        connection.id
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    connection.alive = false;
                }
            }
        }
        self.connections.retain(|_, connection| connection.alive);
    }
}
