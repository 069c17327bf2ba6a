//! Resource routes. Every method reaches the handler; views answer 405 for unbound methods.

use crate::handlers::resource::{collection, item, related};
use crate::state::AppState;
use axum::{routing::any, Router};

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/:collection", any(collection))
        .route("/:collection/:id", any(item))
        .route("/:collection/:id/:relationship", any(related))
        .with_state(state)
}
