use std::time::Duration;

use tokio::sync::mpsc;

use super::envelope::Envelope;
use super::{RelayBus, relay::start_relay_server};
use crate::config::BusSettings;

fn test_settings() -> BusSettings {
    BusSettings {
        relay_url: None,
        channel: "test".to_string(),
        publish_queue: 16,
        reconnect_backoff_ms: 100,
    }
}

#[test]
fn envelope_filters_own_origin() {
    let envelope = Envelope {
        origin: "instance-a".to_string(),
        channel: "test".to_string(),
        message: "hi".to_string(),
    };

    assert!(envelope.is_remote("test", "instance-b"));
    assert!(!envelope.is_remote("test", "instance-a"));
    assert!(!envelope.is_remote("other-channel", "instance-b"));
}

#[tokio::test]
async fn relay_fans_out_to_other_instances_only() {
    let port = portpicker::pick_unused_port().expect("no free ports");
    let addr = format!("127.0.0.1:{port}");
    let url = format!("ws://{addr}");

    tokio::spawn(start_relay_server(addr));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let settings = test_settings();

    let (seen_a, mut rx_a) = mpsc::unbounded_channel::<String>();
    let bus_a = RelayBus::start(&settings, url.clone(), "instance-a".to_string(), move |m| {
        let _ = seen_a.send(m);
    });

    let (seen_b, mut rx_b) = mpsc::unbounded_channel::<String>();
    let _bus_b = RelayBus::start(&settings, url.clone(), "instance-b".to_string(), move |m| {
        let _ = seen_b.send(m);
    });

    // Give both sessions time to connect before publishing.
    tokio::time::sleep(Duration::from_millis(200)).await;

    bus_a.publish("hello from a");

    let received = tokio::time::timeout(Duration::from_secs(2), rx_b.recv())
        .await
        .expect("instance B never heard the publish")
        .expect("handler channel closed");
    assert_eq!(received, "hello from a");

    // The relay echoes to everyone, so A's filter is what keeps A quiet.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx_a.try_recv().is_err(), "publisher must not self-deliver");
}

#[tokio::test]
async fn publish_without_relay_is_swallowed() {
    let port = portpicker::pick_unused_port().expect("no free ports");
    let settings = test_settings();

    // Nothing is listening on this port; the session task just retries.
    let bus = RelayBus::start(
        &settings,
        format!("ws://127.0.0.1:{port}"),
        "instance-a".to_string(),
        |_| {},
    );

    bus.publish("into the void");
    tokio::time::sleep(Duration::from_millis(250)).await;
    // No panic, no error surfaced to the caller: broadcast is best-effort.
    bus.publish("still nothing");
}
