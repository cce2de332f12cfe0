//! Shared application state for all routes.

use crate::client::Client;
use crate::handlers::Registry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    /// Exposed entities by path segment.
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(client: Client) -> Self {
        AppState {
            client,
            registry: Arc::new(Registry::standard()),
        }
    }
}
