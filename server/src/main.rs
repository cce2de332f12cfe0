//! Walrus REST server.
//!
//! Configuration comes from the environment (and `.env`): see `walrus_model::Config`.

use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use walrus_model::{app, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::from_env()?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("walrus_model=info,tower_http=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = walrus_model::open(&cfg).await?;
    let router = app(AppState::new(client))
        .layer(RequestBodyLimitLayer::new(cfg.request_body_limit))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(cfg.server_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, schema = %cfg.db_schema, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
