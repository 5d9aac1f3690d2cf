use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// One section per pipeline tier plus the client-facing server.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub bus: BusSettings,
    pub journal: JournalSettings,
    pub consumer: ConsumerSettings,
    pub batch: BatchSettings,
}

/// Client-facing WebSocket listener settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Per-connection outgoing buffer, in messages. A connection whose
    /// buffer is full has broadcasts dropped rather than stalling the
    /// broadcast loop.
    pub send_buffer: usize,
}

/// Cross-instance relay settings. With no `relay_url` configured the bus
/// is disabled and fan-out stays single-instance.
#[derive(Debug, Deserialize, Clone)]
pub struct BusSettings {
    pub relay_url: Option<String>,
    pub channel: String,
    pub publish_queue: usize,
    pub reconnect_backoff_ms: u64,
}

/// Ack level for producer appends: `write` acknowledges once the event is
/// accepted into the journal's write buffer, `flush` waits until it has
/// reached disk.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    Write,
    Flush,
}

/// Durable log settings.
#[derive(Debug, Deserialize, Clone)]
pub struct JournalSettings {
    pub path: String,
    pub topic: String,
    pub ack: AckMode,
    pub ack_timeout_ms: u64,
}

/// Consumer-group settings for the persistence pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerSettings {
    pub group: String,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub pause_backoff_ms: u64,
}

/// Batch accumulator and persistent store settings.
#[derive(Debug, Deserialize, Clone)]
pub struct BatchSettings {
    pub store_path: String,
    /// Buffer size that triggers an immediate flush.
    pub flush_threshold: usize,
    /// Interval of the timer-driven flush.
    pub flush_interval_ms: u64,
    /// Hard cap on buffered records; ingest fails (retryably) beyond it.
    pub max_buffered: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

/// Partial configuration loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled
/// from `Settings::default()` by the per-section `merge` methods.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub bus: Option<PartialBusSettings>,
    pub journal: Option<PartialJournalSettings>,
    pub consumer: Option<PartialConsumerSettings>,
    pub batch: Option<PartialBatchSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub send_buffer: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBusSettings {
    pub relay_url: Option<String>,
    pub channel: Option<String>,
    pub publish_queue: Option<usize>,
    pub reconnect_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialJournalSettings {
    pub path: Option<String>,
    pub topic: Option<String>,
    pub ack: Option<AckMode>,
    pub ack_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialConsumerSettings {
    pub group: Option<String>,
    pub batch_size: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub pause_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBatchSettings {
    pub store_path: Option<String>,
    pub flush_threshold: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub max_buffered: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

impl PartialSettings {
    pub fn merge(self, defaults: Settings) -> Settings {
        let Settings {
            server,
            bus,
            journal,
            consumer,
            batch,
        } = defaults;
        Settings {
            server: match self.server {
                Some(partial) => partial.merge(server),
                None => server,
            },
            bus: match self.bus {
                Some(partial) => partial.merge(bus),
                None => bus,
            },
            journal: match self.journal {
                Some(partial) => partial.merge(journal),
                None => journal,
            },
            consumer: match self.consumer {
                Some(partial) => partial.merge(consumer),
                None => consumer,
            },
            batch: match self.batch {
                Some(partial) => partial.merge(batch),
                None => batch,
            },
        }
    }
}

impl PartialServerSettings {
    fn merge(self, defaults: ServerSettings) -> ServerSettings {
        ServerSettings {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            send_buffer: self.send_buffer.unwrap_or(defaults.send_buffer),
        }
    }
}

impl PartialBusSettings {
    fn merge(self, defaults: BusSettings) -> BusSettings {
        BusSettings {
            relay_url: self.relay_url.or(defaults.relay_url),
            channel: self.channel.unwrap_or(defaults.channel),
            publish_queue: self.publish_queue.unwrap_or(defaults.publish_queue),
            reconnect_backoff_ms: self
                .reconnect_backoff_ms
                .unwrap_or(defaults.reconnect_backoff_ms),
        }
    }
}

impl PartialJournalSettings {
    fn merge(self, defaults: JournalSettings) -> JournalSettings {
        JournalSettings {
            path: self.path.unwrap_or(defaults.path),
            topic: self.topic.unwrap_or(defaults.topic),
            ack: self.ack.unwrap_or(defaults.ack),
            ack_timeout_ms: self.ack_timeout_ms.unwrap_or(defaults.ack_timeout_ms),
        }
    }
}

impl PartialConsumerSettings {
    fn merge(self, defaults: ConsumerSettings) -> ConsumerSettings {
        ConsumerSettings {
            group: self.group.unwrap_or(defaults.group),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            poll_interval_ms: self.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
            pause_backoff_ms: self.pause_backoff_ms.unwrap_or(defaults.pause_backoff_ms),
        }
    }
}

impl PartialBatchSettings {
    fn merge(self, defaults: BatchSettings) -> BatchSettings {
        BatchSettings {
            store_path: self.store_path.unwrap_or(defaults.store_path),
            flush_threshold: self.flush_threshold.unwrap_or(defaults.flush_threshold),
            flush_interval_ms: self.flush_interval_ms.unwrap_or(defaults.flush_interval_ms),
            max_buffered: self.max_buffered.unwrap_or(defaults.max_buffered),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_ms: self.retry_backoff_ms.unwrap_or(defaults.retry_backoff_ms),
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is
/// provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                send_buffer: 64,
            },
            bus: BusSettings {
                relay_url: None,
                channel: "fanline".to_string(),
                publish_queue: 1024,
                reconnect_backoff_ms: 2000,
            },
            journal: JournalSettings {
                path: "data/journal".to_string(),
                topic: "messages".to_string(),
                ack: AckMode::Write,
                ack_timeout_ms: 5000,
            },
            consumer: ConsumerSettings {
                group: "persisters".to_string(),
                batch_size: 64,
                poll_interval_ms: 250,
                pause_backoff_ms: 1000,
            },
            batch: BatchSettings {
                store_path: "data/store".to_string(),
                flush_threshold: 32,
                flush_interval_ms: 2000,
                max_buffered: 256,
                max_retries: 5,
                retry_backoff_ms: 500,
            },
        }
    }
}
