use super::ConnectionRegistry;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn text_of(message: WsMessage) -> String {
    match message {
        WsMessage::Text(text) => text.to_string(),
        other => panic!("expected a text message, got {other:?}"),
    }
}

#[test]
fn register_assigns_unique_ids() {
    let mut registry = ConnectionRegistry::new();
    let (tx_a, _rx_a) = mpsc::channel::<WsMessage>(4);
    let (tx_b, _rx_b) = mpsc::channel::<WsMessage>(4);

    let a = registry.register(tx_a);
    let b = registry.register(tx_b);

    assert_ne!(a, b);
    assert_eq!(registry.len(), 2);
}

#[test]
fn unregister_is_idempotent() {
    let mut registry = ConnectionRegistry::new();
    let (tx, _rx) = mpsc::channel::<WsMessage>(4);
    let id = registry.register(tx);

    registry.unregister(&id);
    registry.unregister(&id);
    registry.unregister(&"conn-nonexistent".to_string());

    assert!(registry.is_empty());
}

#[test]
fn broadcast_excludes_sender() {
    let mut registry = ConnectionRegistry::new();
    let (tx_a, mut rx_a) = mpsc::channel::<WsMessage>(4);
    let (tx_b, mut rx_b) = mpsc::channel::<WsMessage>(4);
    let sender = registry.register(tx_a);
    let _receiver = registry.register(tx_b);

    registry.broadcast_except_sender("hello", &sender);

    assert_eq!(text_of(rx_b.try_recv().unwrap()), "hello");
    assert!(rx_a.try_recv().is_err());
}

#[test]
fn broadcast_all_reaches_everyone() {
    let mut registry = ConnectionRegistry::new();
    let (tx_a, mut rx_a) = mpsc::channel::<WsMessage>(4);
    let (tx_b, mut rx_b) = mpsc::channel::<WsMessage>(4);
    registry.register(tx_a);
    registry.register(tx_b);

    registry.broadcast_all("relayed");

    assert_eq!(text_of(rx_a.try_recv().unwrap()), "relayed");
    assert_eq!(text_of(rx_b.try_recv().unwrap()), "relayed");
}

#[test]
fn full_buffer_drops_for_that_connection_only() {
    let mut registry = ConnectionRegistry::new();
    let (tx_slow, mut rx_slow) = mpsc::channel::<WsMessage>(1);
    let (tx_fast, mut rx_fast) = mpsc::channel::<WsMessage>(4);
    registry.register(tx_slow);
    registry.register(tx_fast);

    registry.broadcast_all("one");
    // The slow connection never drains; its buffer is now full.
    registry.broadcast_all("two");

    assert_eq!(text_of(rx_slow.try_recv().unwrap()), "one");
    assert!(rx_slow.try_recv().is_err(), "overflow should be dropped");

    assert_eq!(text_of(rx_fast.try_recv().unwrap()), "one");
    assert_eq!(text_of(rx_fast.try_recv().unwrap()), "two");

    // Dropping is per-connection; the slow one stays registered.
    assert_eq!(registry.len(), 2);
}

#[test]
fn no_delivery_after_unregister() {
    let mut registry = ConnectionRegistry::new();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(4);
    let id = registry.register(tx);

    registry.unregister(&id);
    registry.broadcast_all("late");

    assert!(rx.try_recv().is_err());
}

#[test]
fn closed_connections_are_swept_after_broadcast() {
    let mut registry = ConnectionRegistry::new();
    let (tx, rx) = mpsc::channel::<WsMessage>(4);
    registry.register(tx);
    drop(rx);

    registry.broadcast_all("into the void");

    assert!(registry.is_empty());
}
