use super::*;
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn defaults_apply_when_nothing_is_set() {
    unsafe {
        env::remove_var("SERVER_HOST");
        env::remove_var("SERVER_PORT");
    }

    let settings = load_config().expect("load_config failed");
    let defaults = Settings::default();

    assert_eq!(settings.server.host, defaults.server.host);
    assert_eq!(settings.server.port, defaults.server.port);
    assert_eq!(settings.journal.topic, defaults.journal.topic);
    assert_eq!(settings.consumer.group, defaults.consumer.group);
    assert!(settings.bus.relay_url.is_none());
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    unsafe {
        env::set_var("SERVER_HOST", "0.0.0.0");
        env::set_var("SERVER_PORT", "9099");
    }

    let settings = load_config().expect("load_config failed");

    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 9099);
    // Untouched sections keep their defaults.
    let defaults = Settings::default();
    assert_eq!(settings.batch.flush_threshold, defaults.batch.flush_threshold);

    unsafe {
        env::remove_var("SERVER_HOST");
        env::remove_var("SERVER_PORT");
    }
}

#[test]
fn default_ack_mode_is_write() {
    assert_eq!(Settings::default().journal.ack, AckMode::Write);
}
