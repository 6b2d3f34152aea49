//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use nodesql::{ClientConfig, ClientEvent, DatabaseClient, MockTransport, Row};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// RFC 8032 test key 1
pub const TEST_KEY: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
pub const TEST_PUBLIC_KEY: &str =
    "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config(nodes: &[&str], pool_size: usize) -> ClientConfig {
    ClientConfig::new(nodes.iter().map(|n| n.to_string()).collect(), "orders", TEST_KEY)
        .with_pool_size(pool_size)
}

/// Mock transport where later nodes answer health probes more slowly
pub fn ranked_transport(nodes: &[&str]) -> Arc<MockTransport> {
    let transport = Arc::new(MockTransport::new());
    for (i, node) in nodes.iter().enumerate().skip(1) {
        transport.set_health_latency(node, Duration::from_millis(15 * i as u64));
    }
    transport
}

pub async fn initialized_client(
    config: ClientConfig,
    transport: Arc<MockTransport>,
) -> DatabaseClient {
    init_logging();
    let client = DatabaseClient::with_transport(config, transport).expect("valid config");
    client.initialize().await.expect("client initializes");
    client
}

/// Record every event the client emits
pub fn record_events(client: &DatabaseClient) -> Arc<Mutex<Vec<ClientEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    client.subscribe(Arc::new(move |event: &ClientEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

pub fn row(value: Value) -> Row {
    value.as_object().cloned().expect("row literal is an object")
}
