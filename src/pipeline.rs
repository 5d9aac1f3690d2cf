//! The explicit pipeline handle threaded from startup into every
//! connection task.
//!
//! This replaces a lazily initialized process-wide singleton: construction
//! order is visible in `main`, nothing initializes behind the caller's
//! back, and tests wire as many independent pipelines as they need.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::error;

use crate::bus::RelayBus;
use crate::journal::DurableProducer;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::transport::message::message_frame;

/// Producer-assigned correlation key for one inbound message. It is also
/// the store uniqueness key, so an event redelivered by the consumer
/// persists exactly once.
pub fn correlation_key(ingress_millis: i64) -> String {
    format!("message-{ingress_millis}")
}

/// One handle per process, carrying the three delivery legs: in-process
/// broadcast, cross-instance bus, durable append.
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: Arc<Mutex<ConnectionRegistry>>,
    bus: Option<RelayBus>,
    producer: DurableProducer,
    topic: String,
}

impl Pipeline {
    pub fn new(
        registry: Arc<Mutex<ConnectionRegistry>>,
        bus: Option<RelayBus>,
        producer: DurableProducer,
        topic: String,
    ) -> Self {
        Self {
            registry,
            bus,
            producer,
            topic,
        }
    }

    pub fn registry(&self) -> &Arc<Mutex<ConnectionRegistry>> {
        &self.registry
    }

    /// Ingress path for one client message.
    ///
    /// The live leg rebroadcasts to local peers (excluding the sender) and
    /// relays to the other instances; the durable leg appends to the
    /// journal and blocks until the configured ack. The two legs are
    /// intentionally decoupled: a failed append is logged and the message
    /// continues live-only, and nothing on the live leg is retried.
    pub async fn submit(&self, sender_id: &ConnectionId, text: &str) {
        match message_frame(text) {
            Ok(frame) => self
                .registry
                .lock()
                .unwrap()
                .broadcast_except_sender(&frame, sender_id),
            Err(e) => error!("failed to encode outbound frame: {e}"),
        }

        if let Some(bus) = &self.bus {
            bus.publish(text);
        }

        let key = correlation_key(Utc::now().timestamp_millis());
        if let Err(e) = self.producer.append(&self.topic, &key, text).await {
            error!("durable append failed for {key}: {e}");
        }
    }
}
