use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use fanline::bus::RelayBus;
use fanline::config::load_config;
use fanline::journal::{DurableConsumer, DurableProducer, EventJournal};
use fanline::pipeline::Pipeline;
use fanline::registry::ConnectionRegistry;
use fanline::sink::{BatchAccumulator, MessageStore};
use fanline::transport::message::message_frame;
use fanline::transport::websocket::start_websocket_server;
use fanline::utils::logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init("info");

    if let Err(e) = run().await {
        error!("server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_config()?;
    let instance_id = format!("instance-{}", Uuid::new_v4());
    info!("starting {instance_id}");

    let journal = EventJournal::open(&settings.journal.path)?;
    let store = MessageStore::open(&settings.batch.store_path)?;
    let registry = Arc::new(Mutex::new(ConnectionRegistry::new()));
    let producer = DurableProducer::new(journal.clone(), &settings.journal);
    let (accumulator, mut fatal_rx) =
        BatchAccumulator::new(Arc::new(store), settings.batch.clone());

    // Relayed messages reach every local connection: the originating
    // instance already excluded its own sender before publishing.
    let bus = settings.bus.relay_url.clone().map(|url| {
        let registry = registry.clone();
        RelayBus::start(&settings.bus, url, instance_id.clone(), move |message| {
            match message_frame(&message) {
                Ok(frame) => registry.lock().unwrap().broadcast_all(&frame),
                Err(e) => error!("failed to encode relayed frame: {e}"),
            }
        })
    });
    if bus.is_none() {
        info!("no relay configured; fan-out is single-instance");
    }

    let pipeline = Pipeline::new(
        registry,
        bus,
        producer,
        settings.journal.topic.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer = DurableConsumer::new(
        journal,
        accumulator.clone(),
        &settings.consumer,
        &settings.journal.topic,
    );
    let consumer_task = tokio::spawn(consumer.run(shutdown_rx.clone()));
    let timer_task = tokio::spawn(BatchAccumulator::start_flush_timer(
        accumulator,
        shutdown_rx,
    ));
    tokio::spawn(async move {
        while let Some(dropped) = fatal_rx.recv().await {
            error!(
                "batch of {} records dropped after {} attempts: {}",
                dropped.records, dropped.attempts, dropped.reason
            );
        }
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    tokio::select! {
        result = start_websocket_server(addr, pipeline, settings.server.send_buffer) => {
            if let Err(e) = result {
                error!("WebSocket server exited: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, exiting gracefully");
        }
    }

    // Let the consumer finish its in-flight work and flush what it holds.
    shutdown_tx.send(true).ok();
    consumer_task.await.ok();
    timer_task.await.ok();

    Ok(())
}
