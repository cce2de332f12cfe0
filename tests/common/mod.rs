#![allow(dead_code)]

use sqlx::postgres::PgPoolOptions;
use std::ops::Deref;
use walrus_model::{apply_migrations, Client};

/// Client on a schema of its own. The schema is dropped with the guard.
pub struct TestDb {
    client: Client,
    url: String,
    schema: String,
}

impl Deref for TestDb {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let url = self.url.clone();
        let statement = format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", self.schema);
        // The test's runtime may be shutting down; drop on a runtime of our own.
        let dropped = std::thread::spawn(move || -> std::io::Result<()> {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            rt.block_on(async {
                let pool = PgPoolOptions::new().max_connections(1).connect(&url).await?;
                sqlx::query(&statement).execute(&pool).await?;
                pool.close().await;
                Ok::<(), sqlx::Error>(())
            })
            .map_err(std::io::Error::other)
        })
        .join();
        if !matches!(dropped, Ok(Ok(()))) {
            eprintln!("could not drop test schema {}", self.schema);
        }
    }
}

/// Client on a fresh schema of `TEST_DATABASE_URL`, or `None` when the
/// variable is unset and database tests are skipped.
pub async fn client() -> Option<TestDb> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    let schema = format!("walrus_test_{}", uuid::Uuid::new_v4().simple());
    apply_migrations(&pool, &schema).await.expect("migrate test schema");
    Some(TestDb {
        client: Client::new(pool, schema.clone()),
        url,
        schema,
    })
}

/// Client whose pool never connects; enough for requests that fail before
/// reaching the database.
pub fn offline_client() -> Client {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://walrus@127.0.0.1:1/walrus")
        .expect("lazy pool");
    Client::new(pool, "walrus")
}
