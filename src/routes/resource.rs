//! Entity CRUD routes. Handlers resolve the entity from the path segment.

use crate::handlers::resource::{bulk_create, bulk_delete, create, delete, list, read, update};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/:resource", get(list).post(create))
        .route("/:resource/bulk", post(bulk_create).delete(bulk_delete))
        .route("/:resource/:id", get(read).patch(update).delete(delete))
        .with_state(state)
}
