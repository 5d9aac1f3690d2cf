use serde::{Deserialize, Serialize};

/// Frames a client may send.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Submit one message for fan-out and durable recording.
    #[serde(rename = "submit")]
    Submit { message: String },
}

/// Frames the server sends.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Fan-out of a peer's message.
    #[serde(rename = "message")]
    Message { message: String },

    /// First frame after accept: the identifier assigned to this
    /// connection, for diagnostic display only.
    #[serde(rename = "connected")]
    Connected { connection_id: String },
}

/// Encodes the outbound fan-out frame for one message payload. The local
/// broadcast path and the bus delivery path both produce this frame.
pub fn message_frame(text: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerMessage::Message {
        message: text.to_string(),
    })
}
