//! Database bootstrap: create the database when missing, open the pool, migrate.

use crate::client::Client;
use crate::config::Config;
use crate::crypto;
use crate::error::{AppError, ConfigError};
use crate::migration::apply_migrations;
use crate::sql::quoted;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// `postgres` maintenance database to run CREATE DATABASE.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin, db_name) = maintenance_options(database_url)?;
    let Some(db_name) = db_name.filter(|n| !n.is_empty() && n != "postgres") else {
        return Ok(());
    };
    let mut conn = admin.connect().await?;
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&mut conn)
            .await?;
    if !exists {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "created database");
    }
    Ok(())
}

/// Options for the `postgres` maintenance database and the database named in `url`.
fn maintenance_options(url: &str) -> Result<(PgConnectOptions, Option<String>), ConfigError> {
    let opts = PgConnectOptions::from_str(url).map_err(|e| ConfigError::Invalid {
        name: "DATABASE_URL",
        message: e.to_string(),
    })?;
    let db_name = opts.get_database().map(str::to_string);
    Ok((opts.database("postgres"), db_name))
}

pub async fn connect(cfg: &Config) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout)
        .connect(&cfg.database_url)
        .await?;
    Ok(pool)
}

/// Creates the database when missing, connects and migrates when enabled.
pub async fn open(cfg: &Config) -> Result<Client, AppError> {
    if let Some(cipher) = &cfg.data_encryption {
        if !crypto::install(cipher.clone()) {
            tracing::warn!("data encryption key already installed; keeping the first one");
        }
    }
    ensure_database_exists(&cfg.database_url).await?;
    let pool = connect(cfg).await?;
    if cfg.auto_migrate {
        apply_migrations(&pool, &cfg.db_schema).await?;
    }
    let client = Client::new(pool, cfg.db_schema.clone());
    Ok(if cfg.db_debug { client.debug() } else { client })
}
