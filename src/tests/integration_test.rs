use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tempfile::tempdir;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tungstenite::protocol::Message as WsMessage;

use crate::config::{AckMode, BatchSettings, ConsumerSettings, JournalSettings};
use crate::journal::{DurableConsumer, DurableProducer, EventJournal};
use crate::pipeline::Pipeline;
use crate::registry::ConnectionRegistry;
use crate::sink::{BatchAccumulator, MessageStore};
use crate::transport::websocket::start_websocket_server;

struct TestStack {
    store: Arc<MessageStore>,
    shutdown: watch::Sender<bool>,
    url: String,
    _journal_dir: tempfile::TempDir,
    _store_dir: tempfile::TempDir,
}

/// Wires a full single-instance pipeline on ephemeral ports and paths,
/// with timings tightened for tests.
async fn start_stack() -> TestStack {
    let journal_dir = tempdir().unwrap();
    let store_dir = tempdir().unwrap();

    let journal = EventJournal::open(journal_dir.path().to_str().unwrap()).unwrap();
    let store = Arc::new(MessageStore::open(store_dir.path().to_str().unwrap()).unwrap());

    let journal_settings = JournalSettings {
        path: String::new(),
        topic: "messages".to_string(),
        ack: AckMode::Write,
        ack_timeout_ms: 1000,
    };
    let consumer_settings = ConsumerSettings {
        group: "persisters".to_string(),
        batch_size: 16,
        poll_interval_ms: 20,
        pause_backoff_ms: 50,
    };
    let batch_settings = BatchSettings {
        store_path: String::new(),
        flush_threshold: 100,
        flush_interval_ms: 100,
        max_buffered: 100,
        max_retries: 1,
        retry_backoff_ms: 10,
    };

    let registry = Arc::new(Mutex::new(ConnectionRegistry::new()));
    let producer = DurableProducer::new(journal.clone(), &journal_settings);
    let (accumulator, _fatal_rx) = BatchAccumulator::new(store.clone(), batch_settings);
    let pipeline = Pipeline::new(registry, None, producer, "messages".to_string());

    let (shutdown, shutdown_rx) = watch::channel(false);
    let consumer = DurableConsumer::new(
        journal,
        accumulator.clone(),
        &consumer_settings,
        "messages",
    );
    tokio::spawn(consumer.run(shutdown_rx.clone()));
    tokio::spawn(BatchAccumulator::start_flush_timer(accumulator, shutdown_rx));

    let port = portpicker::pick_unused_port().expect("no free ports");
    let addr = format!("127.0.0.1:{port}");
    tokio::spawn(start_websocket_server(addr.clone(), pipeline, 64));
    tokio::time::sleep(Duration::from_millis(150)).await;

    TestStack {
        store,
        shutdown,
        url: format!("ws://{addr}"),
        _journal_dir: journal_dir,
        _store_dir: store_dir,
    }
}

async fn next_text(
    ws: &mut (impl Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin),
) -> serde_json::Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("connection error");
        if let WsMessage::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn end_to_end_fanout_and_persistence() {
    let stack = start_stack().await;

    let (mut ws_x, _) = connect_async(stack.url.as_str()).await.expect("client X connect");
    let (mut ws_y, _) = connect_async(stack.url.as_str()).await.expect("client Y connect");

    // Both clients are greeted with their connection id.
    let hello_x = next_text(&mut ws_x).await;
    assert_eq!(hello_x["type"], "connected");
    assert!(
        hello_x["connection_id"]
            .as_str()
            .unwrap()
            .starts_with("conn-")
    );
    let hello_y = next_text(&mut ws_y).await;
    assert_eq!(hello_y["type"], "connected");

    // X submits; Y hears it.
    ws_x.send(WsMessage::text(
        r#"{"type":"submit","message":"hello"}"#.to_string(),
    ))
    .await
    .unwrap();

    let received = next_text(&mut ws_y).await;
    assert_eq!(received["type"], "message");
    assert_eq!(received["message"], "hello");

    // X must not receive its own message back.
    let echo = tokio::time::timeout(Duration::from_millis(300), ws_x.next()).await;
    assert!(echo.is_err(), "sender must not self-receive");

    // After the flush interval the message is durably recorded once.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let recent = stack.store.recent(16).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].text, "hello");

    stack.shutdown.send(true).ok();
}

#[tokio::test]
async fn live_path_survives_messages_from_departed_peers() {
    let stack = start_stack().await;

    let (mut ws_a, _) = connect_async(stack.url.as_str()).await.expect("client A connect");
    let (mut ws_b, _) = connect_async(stack.url.as_str()).await.expect("client B connect");
    let _ = next_text(&mut ws_a).await;
    let _ = next_text(&mut ws_b).await;

    // B leaves; A's submissions still go through and get persisted.
    ws_b.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    ws_a.send(WsMessage::text(
        r#"{"type":"submit","message":"anyone there?"}"#.to_string(),
    ))
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let recent = stack.store.recent(16).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].text, "anyone there?");

    stack.shutdown.send(true).ok();
}
