use serde::{Deserialize, Serialize};

/// Wire form of one bus message: the payload plus the channel it belongs
/// to and the instance that published it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub origin: String,
    pub channel: String,
    pub message: String,
}

impl Envelope {
    /// True when this envelope should reach the local subscriber: it is on
    /// our channel and did not originate here. The relay echoes frames to
    /// every peer, so a publisher hears its own traffic back and must
    /// drop it.
    pub fn is_remote(&self, channel: &str, instance_id: &str) -> bool {
        self.channel == channel && self.origin != instance_id
    }
}
