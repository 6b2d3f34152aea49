use nodesql::{
    ClientError, ClientEvent, ColumnDefinition, ColumnType, Consistency, IndexDefinition,
    MockTransport, QueryOptions, SelectOptions, TableSchema,
};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{config, initialized_client, record_events, row};

#[tokio::test]
async fn begin_and_commit_share_one_transaction_id() {
    let transport = Arc::new(MockTransport::new());
    let client = initialized_client(config(&["http://n1"], 2), transport.clone()).await;
    let events = record_events(&client);

    let tx = client.begin_transaction(Some(Consistency::Strong)).await.unwrap();
    let id = tx.id().to_string();
    tx.query("UPDATE accounts SET balance = balance - $1 WHERE id = $2", &[json!(10), json!(1)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let sent = transport.recorded_queries();
    let begins: Vec<_> = sent.iter().filter(|q| q.sql == "BEGIN TRANSACTION").collect();
    let commits: Vec<_> = sent.iter().filter(|q| q.sql == "COMMIT").collect();
    assert_eq!(begins.len(), 1);
    assert_eq!(commits.len(), 1);
    assert!(sent
        .iter()
        .all(|q| q.transaction_id.as_deref() == Some(id.as_str())));
    assert!(sent.iter().all(|q| q.consistency == Consistency::Strong));

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            ClientEvent::TransactionStarted {
                transaction_id: id.clone()
            },
            ClientEvent::TransactionCommitted { transaction_id: id },
        ]
    );
}

#[tokio::test]
async fn row_helpers_write_inside_a_transaction() {
    let transport = Arc::new(MockTransport::new());
    let client = initialized_client(
        config(&["http://n1"], 2).with_default_consistency(Consistency::Eventual),
        transport.clone(),
    )
    .await;

    let tx = client.begin_transaction(None).await.unwrap();
    let id = tx.id().to_string();
    client
        .insert_one("accounts", row(json!({"id": 1, "balance": 10})), tx.options())
        .await
        .unwrap();
    client
        .update(
            "accounts",
            &row(json!({"balance": 5})),
            "id = $1",
            &[json!(1)],
            tx.options(),
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();
    client
        .insert_one("audit", row(json!({"note": "done"})), QueryOptions::new())
        .await
        .unwrap();

    let sent: Vec<_> = transport
        .recorded_queries()
        .into_iter()
        .map(|q| (q.sql, q.transaction_id, q.consistency))
        .collect();
    let tagged = Some(id);
    assert_eq!(
        sent,
        vec![
            ("BEGIN TRANSACTION".to_string(), tagged.clone(), Consistency::Eventual),
            (
                "INSERT INTO accounts (id, balance) VALUES ($1, $2)".to_string(),
                tagged.clone(),
                Consistency::Eventual
            ),
            (
                "UPDATE accounts SET balance = $1 WHERE id = $2".to_string(),
                tagged.clone(),
                Consistency::Eventual
            ),
            ("COMMIT".to_string(), tagged, Consistency::Eventual),
            (
                "INSERT INTO audit (note) VALUES ($1)".to_string(),
                None,
                Consistency::Strong
            ),
        ]
    );
}

#[tokio::test]
async fn failed_rollback_reports_transaction_error() {
    let transport = Arc::new(MockTransport::new());
    let client = initialized_client(
        config(&["http://n1"], 1).with_retry_attempts(1),
        transport.clone(),
    )
    .await;

    let tx = client.begin_transaction(None).await.unwrap();
    let id = tx.id().to_string();
    transport.fail_queries("http://n1", true);

    match tx.rollback().await {
        Err(ClientError::Transaction {
            transaction_id,
            operation,
            source,
        }) => {
            assert_eq!(transaction_id, id);
            assert_eq!(operation, "rollback");
            assert!(matches!(*source, ClientError::QueryFailed { attempts: 1, .. }));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn schema_lifecycle_over_the_client() {
    let transport = Arc::new(MockTransport::new());
    let client = initialized_client(
        config(&["http://n1"], 2).with_default_consistency(Consistency::Eventual),
        transport.clone(),
    )
    .await;

    let users = TableSchema::new("users")
        .column(ColumnDefinition::new("id", ColumnType::Integer).not_null())
        .column(ColumnDefinition::new("name", ColumnType::Text))
        .primary_key(&["id"])
        .index(IndexDefinition::new("idx_users_name", vec!["name".to_string()]));
    client.create_table(&users).await.unwrap();
    assert_eq!(client.list_tables(), vec!["users"]);

    client
        .insert(
            "users",
            &[row(json!({"id": 1, "name": "ada"})), row(json!({"id": 2, "name": "bob"}))],
            QueryOptions::new(),
        )
        .await
        .unwrap();
    client
        .update(
            "users",
            &row(json!({"name": "eve"})),
            "id = $1",
            &[json!(2)],
            QueryOptions::new(),
        )
        .await
        .unwrap();
    client
        .select("users", &SelectOptions::new().filter("id > $1", vec![json!(0)]).limit(5))
        .await
        .unwrap();
    client
        .delete("users", "id = $1", &[json!(1)], QueryOptions::new())
        .await
        .unwrap();
    client.drop_table("users").await.unwrap();
    assert!(client.list_tables().is_empty());

    let sql: Vec<_> = transport
        .recorded_queries()
        .into_iter()
        .map(|q| (q.sql, q.consistency))
        .collect();
    assert_eq!(
        sql,
        vec![
            (
                "CREATE TABLE IF NOT EXISTS users (id INTEGER NOT NULL, name TEXT, PRIMARY KEY (id))"
                    .to_string(),
                Consistency::Strong
            ),
            (
                "CREATE INDEX IF NOT EXISTS idx_users_name ON users (name)".to_string(),
                Consistency::Strong
            ),
            (
                "INSERT INTO users (id, name) VALUES ($1, $2), ($3, $4)".to_string(),
                Consistency::Strong
            ),
            (
                "UPDATE users SET name = $1 WHERE id = $2".to_string(),
                Consistency::Strong
            ),
            (
                "SELECT * FROM users WHERE id > $1 LIMIT 5".to_string(),
                Consistency::Eventual
            ),
            (
                "DELETE FROM users WHERE id = $1".to_string(),
                Consistency::Strong
            ),
            ("DROP TABLE IF EXISTS users".to_string(), Consistency::Strong),
        ]
    );
}

#[tokio::test]
async fn hostile_identifiers_never_reach_a_node() {
    let transport = Arc::new(MockTransport::new());
    let client = initialized_client(config(&["http://n1"], 1), transport.clone()).await;

    let attempts = [
        client.drop_table("users; DROP TABLE accounts").await.err(),
        client
            .insert_one("users", row(json!({"name'); --": "x"})), QueryOptions::new())
            .await
            .err(),
        client
            .select("users", &SelectOptions::new().columns(&["*"]))
            .await
            .err(),
        client
            .count("users\"", None, &[], QueryOptions::new())
            .await
            .err(),
    ];
    for err in attempts {
        assert!(matches!(err, Some(ClientError::Validation(_))));
    }
    assert!(transport.recorded_queries().is_empty());

    // Raw statements are passed through untouched
    client
        .query("SELECT 1", &[], QueryOptions::eventual())
        .await
        .unwrap();
    assert_eq!(transport.recorded_queries().len(), 1);
}
