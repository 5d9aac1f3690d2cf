use tokio::sync::mpsc::Sender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

pub type ConnectionId = String;

/// A live client connection as the registry sees it.
///
/// Holds the identifier assigned at accept time and the sending half of
/// the connection's bounded outgoing buffer. The receiving half lives with
/// the connection's forward task in the transport layer.
#[derive(Debug)]
pub struct Connection {
    /// Unique for the lifetime of the connection.
    pub id: ConnectionId,

    /// Channel into the connection's outgoing buffer.
    pub sender: Sender<WsMessage>,

    /// Cleared when a send observes the peer side gone; swept by the
    /// registry after the next broadcast.
    pub alive: bool,
}

impl Connection {
    pub fn new(sender: Sender<WsMessage>) -> Self {
        Self {
            id: format!("conn-{}", Uuid::new_v4()),
            sender,
            alive: true,
        }
    }
}
