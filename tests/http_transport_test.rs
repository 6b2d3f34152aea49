use nodesql::crypto::{verify_request_signature, ClientKeyPair};
use nodesql::{
    ClientError, Consistency, DatabaseClient, HttpTransport, NodeTransport, QueryOptions,
    TransportError,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{config, TEST_KEY, TEST_PUBLIC_KEY};

async fn healthy_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn health_probe_maps_status() {
    common::init_logging();
    let ok = healthy_server().await;
    let failing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(503).set_body_string("draining"))
        .mount(&failing)
        .await;

    let transport = HttpTransport::new().unwrap();
    transport
        .check_health(&ok.uri(), Duration::from_secs(2))
        .await
        .unwrap();
    let err = transport
        .check_health(&failing.uri(), Duration::from_secs(2))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransportError::Status {
            status: 503,
            body: "draining".to_string()
        }
    );
}

#[tokio::test]
async fn slow_health_probe_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let err = HttpTransport::new()
        .unwrap()
        .check_health(&server.uri(), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::Timeout { timeout_ms: 50 });
}

#[tokio::test]
async fn query_carries_signed_headers() {
    common::init_logging();
    let server = healthy_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/query"))
        .and(header("X-Database-ID", "orders"))
        .and(header("X-Consistency", "eventual"))
        .and(header_exists("X-Auth-Timestamp"))
        .and(header_exists("X-Auth-Signature"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{"id": 1, "name": "ada"}],
            "rowCount": 1,
            "affectedRows": 0,
            "lastInsertId": 17
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let client = DatabaseClient::new(config(&[uri.as_str()], 1)).unwrap();
    client.initialize().await.unwrap();
    let result = client
        .query("SELECT * FROM users WHERE id = $1", &[json!(1)], QueryOptions::eventual())
        .await
        .unwrap();
    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0]["name"], json!("ada"));
    assert_eq!(result.last_insert_id.as_deref(), Some("17"));

    let requests = server.received_requests().await.unwrap();
    let query = requests
        .iter()
        .find(|r| r.url.path() == "/v1/query")
        .expect("query request was sent");
    let body = String::from_utf8(query.body.clone()).unwrap();
    let sent: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(sent, json!({"sql": "SELECT * FROM users WHERE id = $1", "params": [1]}));
    assert!(query.headers.get("X-Transaction-ID").is_none());

    let timestamp = query.headers.get("X-Auth-Timestamp").unwrap().to_str().unwrap();
    let signature = query.headers.get("X-Auth-Signature").unwrap().to_str().unwrap();
    let key = ClientKeyPair::from_hex(TEST_KEY).unwrap();
    assert_eq!(key.public_key().to_hex(), TEST_PUBLIC_KEY);
    verify_request_signature(key.public_key(), "orders", timestamp, &body, signature).unwrap();
    assert!(!body.contains(TEST_KEY) && !signature.contains(TEST_KEY));
}

#[tokio::test]
async fn server_errors_and_bad_bodies_fail_over() {
    let broken = healthy_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&broken)
        .await;
    let erroring = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(30)))
        .mount(&erroring)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&erroring)
        .await;

    let (first, second) = (broken.uri(), erroring.uri());
    let client = DatabaseClient::new(
        config(&[first.as_str(), second.as_str()], 1).with_retry_attempts(2),
    )
    .unwrap();
    client.initialize().await.unwrap();

    let err = client
        .query_strong("SELECT 1", &[])
        .await
        .unwrap_err();
    match err {
        ClientError::QueryFailed { attempts, last_error } => {
            assert_eq!(attempts, 2);
            assert_eq!(
                last_error,
                TransportError::Status {
                    status: 500,
                    body: "boom".to_string()
                }
            );
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn transaction_id_header_is_sent() {
    let server = healthy_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/query"))
        .and(header_exists("X-Transaction-ID"))
        .and(header("X-Consistency", "strong"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [],
            "rowCount": 0,
            "affectedRows": 0
        })))
        .expect(3)
        .mount(&server)
        .await;

    let uri = server.uri();
    let client = DatabaseClient::new(config(&[uri.as_str()], 1)).unwrap();
    client.initialize().await.unwrap();
    let tx = client
        .begin_transaction(Some(Consistency::Strong))
        .await
        .unwrap();
    let id = tx.id().to_string();
    client
        .insert_one("users", common::row(json!({"name": "ada"})), tx.options())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let tagged: Vec<_> = requests
        .iter()
        .filter(|r| r.url.path() == "/v1/query")
        .map(|r| r.headers.get("X-Transaction-ID").unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(tagged, vec![id.clone(), id.clone(), id]);
}
