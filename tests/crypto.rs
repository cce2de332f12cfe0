//! Sealed columns against a live database. Runs in its own binary because the
//! data encryption key is process-wide.

mod common;

use serde_json::json;
use walrus_model::crypto::{self, Cipher, PREFIX};
use walrus_model::model::{Connector, Subject, Token};

const KEY: &str = "aesgcm:000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

async fn raw_column(db: &common::TestDb, table: &str, column: &str) -> String {
    let sql = format!("SELECT {column} FROM \"{}\".{table}", db.schema());
    sqlx::query_scalar(&sql).fetch_one(db.pool().unwrap()).await.unwrap()
}

#[tokio::test]
async fn sealed_columns_are_encrypted_at_rest() {
    let Some(db) = common::client().await else {
        return;
    };
    crypto::install(Cipher::parse(KEY).unwrap());

    let mut connector = Connector {
        name: "k8s".into(),
        kind: "Kubernetes".into(),
        category: "Kubernetes".into(),
        config_version: "v1".into(),
        ..Default::default()
    };
    connector.config_data.insert("kubeconfig".into(), json!("apiVersion: v1"));
    let saved = db.connectors().create(connector).save().await.unwrap();

    let raw = raw_column(&db, "connectors", "config_data").await;
    assert!(raw.starts_with(PREFIX), "{raw}");
    assert!(!raw.contains("apiVersion"));
    let read = db.connectors().get(&saved.id).await.unwrap();
    assert_eq!(read.config_data["kubeconfig"], "apiVersion: v1");

    let subject = Subject {
        kind: "user".into(),
        domain: "builtin".into(),
        name: "admin".into(),
        ..Default::default()
    };
    let subject = db.subjects().create(subject).save().await.unwrap();
    let token = Token {
        subject_id: subject.id,
        name: "ci".into(),
        ..Default::default()
    };
    let token = db.tokens().create(token).save().await.unwrap();
    assert!(!token.value.is_empty());

    let raw = raw_column(&db, "tokens", "value").await;
    assert!(raw.starts_with(PREFIX), "{raw}");
    assert_ne!(raw, *token.value);
    let read = db.tokens().get(&token.id).await.unwrap();
    assert_eq!(*read.value, *token.value);
}
